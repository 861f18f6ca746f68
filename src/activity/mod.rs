//! Activity Module
//!
//! Pluggable side-effecting behavior run when a flow enters or leaves a
//! step, and the machinery that locates activities by name.
//!
//! # Structure
//!
//! - [`registry`]: Statically registered activity factories
//! - [`module`]: Uploaded activity modules and the module store contract
//! - [`resolver`]: Name lookup across the registry and the module store
//! - [`builtin`]: Activities that are always available

pub mod builtin;
pub mod module;
pub mod registry;
pub mod resolver;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ActivityError;
use crate::execution::Actor;
use crate::flow::State;

pub use builtin::{LogActivity, NoopActivity};
pub use module::{ActivityModule, InMemoryModuleStore, ModuleStore};
pub use registry::{ActivityFactory, ActivityRegistry};
pub use resolver::ActivityResolver;

/// Which step hook an activity runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Entry,
    Exit,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// Everything the pipeline passes to an activity. Owned, so activities can
/// run on their own task.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    pub execution_id: Uuid,
    pub flow_key: String,
    pub hook: Hook,
    pub from: State,
    pub to: State,
    pub trigger: i32,
    pub data: HashMap<String, Value>,
    pub actor: Option<Actor>,
}

/// A unit of side-effecting logic invoked on step entry or exit.
///
/// Implementations may hold their own state but receive no shared mutable
/// context beyond the [`ActivityContext`].
#[async_trait]
pub trait Activity: Send + Sync {
    /// Registry name of the activity.
    fn name(&self) -> &str;

    async fn invoke(&self, context: &ActivityContext) -> Result<(), ActivityError>;

    /// Undoes the effects of `invoke`. Called only on explicit rollback.
    async fn compensate(&self, context: &ActivityContext) -> Result<(), ActivityError> {
        let _ = context;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_display() {
        assert_eq!(Hook::Entry.to_string(), "entry");
        assert_eq!(Hook::Exit.to_string(), "exit");
    }

    #[tokio::test]
    async fn test_default_compensate_is_noop() {
        let context = ActivityContext {
            execution_id: Uuid::new_v4(),
            flow_key: "approval".to_string(),
            hook: Hook::Exit,
            from: State::new(0, "Draft"),
            to: State::new(1, "Review"),
            trigger: 1,
            data: HashMap::new(),
            actor: None,
        };

        assert!(NoopActivity.compensate(&context).await.is_ok());
    }
}
