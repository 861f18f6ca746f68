//! Built-in Activities
//!
//! Activities every registry created with
//! [`ActivityRegistry::with_builtins`](super::ActivityRegistry::with_builtins) knows.

use async_trait::async_trait;
use log::info;

use super::{Activity, ActivityContext, ActivityRegistry};
use crate::error::ActivityError;

/// Logs each transition it is attached to.
#[derive(Debug, Clone, Default)]
pub struct LogActivity;

#[async_trait]
impl Activity for LogActivity {
    fn name(&self) -> &str {
        "log"
    }

    async fn invoke(&self, context: &ActivityContext) -> Result<(), ActivityError> {
        info!(
            "[{}] {}: '{}' -> '{}' (trigger {}, execution {})",
            context.hook, context.flow_key, context.from, context.to, context.trigger, context.execution_id
        );
        Ok(())
    }
}

/// Does nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopActivity;

#[async_trait]
impl Activity for NoopActivity {
    fn name(&self) -> &str {
        "noop"
    }

    async fn invoke(&self, _context: &ActivityContext) -> Result<(), ActivityError> {
        Ok(())
    }
}

pub(crate) fn register_builtins(registry: &mut ActivityRegistry) {
    registry
        .register_default::<LogActivity>("log")
        .register_default::<NoopActivity>("noop");
}
