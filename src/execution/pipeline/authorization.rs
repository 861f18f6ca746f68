//! Authorization stage: decides whether the fire's actor may take the
//! matched transition.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use super::{Chain, Stage, StepHandler};
use crate::error::FlowError;
use crate::execution::context::{Actor, FireResult, StepContext};
use crate::flow::Transition;

/// Grants or denies a transition. `Err` carries the denial reason.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, actor: Option<&Actor>, transition: &Transition) -> Result<(), String>;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _actor: Option<&Actor>, _transition: &Transition) -> Result<(), String> {
        Ok(())
    }
}

/// Restricts triggers to named actors. Triggers without an entry are open.
#[derive(Debug, Clone, Default)]
pub struct TriggerPermissions {
    allowed: HashMap<i32, HashSet<String>>,
}

impl TriggerPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `actor` fire `trigger`.
    pub fn allow(mut self, trigger: i32, actor: impl Into<String>) -> Self {
        self.allowed.entry(trigger).or_default().insert(actor.into());
        self
    }
}

#[async_trait]
impl Authorizer for TriggerPermissions {
    async fn authorize(&self, actor: Option<&Actor>, transition: &Transition) -> Result<(), String> {
        let Some(names) = self.allowed.get(&transition.trigger) else {
            return Ok(());
        };

        match actor {
            Some(actor) if names.contains(&actor.name) => Ok(()),
            Some(_) => Err(format!("trigger {} is restricted", transition.trigger)),
            None => Err(format!("trigger {} requires an actor", transition.trigger)),
        }
    }
}

pub struct AuthorizationHandler {
    authorizer: Arc<dyn Authorizer>,
}

impl AuthorizationHandler {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }
}

#[async_trait]
impl StepHandler for AuthorizationHandler {
    fn stage(&self) -> Stage {
        Stage::Authorization
    }

    async fn handle(&self, context: &mut StepContext, chain: Chain<'_>) -> Result<FireResult, FlowError> {
        let actor = context.data.actor.as_ref();

        if let Err(reason) = self.authorizer.authorize(actor, context.transition()).await {
            let actor = actor.map(|a| a.name.clone()).unwrap_or_else(|| "anonymous".to_string());
            warn!("Denied trigger {} to '{}': {}", context.transition().trigger, actor, reason);
            return Err(FlowError::Unauthorized { actor, reason });
        }

        debug!("Trigger {} authorized", context.transition().trigger);
        chain.next(context).await
    }
}
