//! Fire Handler Pipeline
//!
//! A fire is a single pass through an ordered list of handlers:
//!
//! ```text
//! Authorization -> ActivityExecution -> TransitionValidation -> PersistenceCommit
//! ```
//!
//! The handler list is immutable and shared by every fire. Each handler
//! receives a [`Chain`] cursor and decides whether to continue with
//! [`Chain::next`]. Rollback walks the same list backward through
//! [`Chain::previous`].
//!
//! The pipeline runs on its own task, so an error or a panic anywhere in
//! the chain surfaces as a failed [`FireResult`] instead of reaching the
//! caller.

mod activity;
mod authorization;
mod commit;
mod transition;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::task::JoinError;

use super::context::{FireResult, StepContext};
use super::model::Execution;
use crate::activity::ActivityResolver;
use crate::error::FlowError;
use crate::storage::ExecutionRepository;

pub use activity::ActivityHandler;
pub use authorization::{AllowAll, AuthorizationHandler, Authorizer, TriggerPermissions};
pub use commit::CommitHandler;
pub use transition::TransitionHandler;

/// Position of a handler in the standard pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Authorization,
    ActivityExecution,
    TransitionValidation,
    PersistenceCommit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authorization => "authorization",
            Self::ActivityExecution => "activity-execution",
            Self::TransitionValidation => "transition-validation",
            Self::PersistenceCommit => "persistence-commit",
        };
        write!(f, "{}", name)
    }
}

/// One concern of a fire.
#[async_trait]
pub trait StepHandler: Send + Sync {
    fn stage(&self) -> Stage;

    /// Performs the concern, then usually hands over to `chain.next`.
    ///
    /// Returning an error stops the fire; later handlers never run.
    async fn handle(&self, context: &mut StepContext, chain: Chain<'_>) -> Result<FireResult, FlowError>;

    /// Undoes the concern and hands over to the previous handler.
    async fn roll_back(&self, context: &mut StepContext, chain: Chain<'_>) -> FireResult {
        chain.previous(context).await
    }
}

/// Cursor into the handler list, pointing at the running handler.
#[derive(Clone, Copy)]
pub struct Chain<'a> {
    handlers: &'a [Arc<dyn StepHandler>],
    index: usize,
}

impl<'a> Chain<'a> {
    fn at(handlers: &'a [Arc<dyn StepHandler>], index: usize) -> Self {
        Self { handlers, index }
    }

    /// Runs the following handler, or completes the fire at the end of the list.
    pub async fn next(self, context: &mut StepContext) -> Result<FireResult, FlowError> {
        let index = self.index + 1;
        match self.handlers.get(index) {
            Some(handler) => {
                debug!("Fire {}: {}", context.execution.id, handler.stage());
                handler.handle(context, Chain::at(self.handlers, index)).await
            }
            None => Ok(FireResult::completed(&context.execution)),
        }
    }

    /// Rolls back the preceding handler. The first handler has none, so the
    /// walk ends with a failed result.
    pub async fn previous(self, context: &mut StepContext) -> FireResult {
        if self.index == 0 {
            return FireResult::rolled_back();
        }

        let index = self.index - 1;
        match self.handlers.get(index) {
            Some(handler) => {
                debug!("Rollback {}: {}", context.execution.id, handler.stage());
                handler.roll_back(context, Chain::at(self.handlers, index)).await
            }
            None => FireResult::rolled_back(),
        }
    }
}

/// What a fire produced: the result, plus the advanced execution when the
/// fire completed.
#[derive(Debug)]
pub struct FireOutcome {
    pub result: FireResult,
    pub execution: Option<Execution>,
}

impl FireOutcome {
    pub fn failed(error: &FlowError) -> Self {
        Self {
            result: FireResult::failed(error),
            execution: None,
        }
    }
}

/// Immutable, ordered handler list.
#[derive(Clone)]
pub struct Pipeline {
    handlers: Arc<[Arc<dyn StepHandler>]>,
}

impl Pipeline {
    pub fn new(handlers: Vec<Arc<dyn StepHandler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    /// The four standard handlers in their fixed order.
    pub fn standard(
        authorizer: Arc<dyn Authorizer>,
        resolver: Arc<ActivityResolver>,
        executions: Arc<dyn ExecutionRepository>,
        max_depth: usize,
    ) -> Self {
        let handlers: Vec<Arc<dyn StepHandler>> = vec![
            Arc::new(AuthorizationHandler::new(authorizer)),
            Arc::new(ActivityHandler::new(resolver)),
            Arc::new(TransitionHandler),
            Arc::new(CommitHandler::new(executions, max_depth)),
        ];
        Self::new(handlers)
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.handlers.iter().map(|h| h.stage()).collect()
    }

    /// Runs the context through every handler.
    pub async fn fire(&self, context: StepContext) -> FireOutcome {
        let handlers = Arc::clone(&self.handlers);
        let id = context.execution.id;

        let task = tokio::spawn(async move {
            let mut context = context;
            let result = match handlers.first() {
                Some(head) => {
                    debug!("Fire {}: {}", id, head.stage());
                    head.handle(&mut context, Chain::at(&handlers, 0)).await
                }
                None => Ok(FireResult::completed(&context.execution)),
            };
            (result, context)
        });

        match task.await {
            Ok((Ok(result), context)) if result.is_completed() => FireOutcome {
                result,
                execution: Some(context.execution),
            },
            Ok((Ok(result), _)) => FireOutcome {
                result,
                execution: None,
            },
            Ok((Err(e), _)) => {
                warn!("Fire on execution {} failed: {}", id, e);
                FireOutcome::failed(&e)
            }
            Err(e) => {
                let fault = fault_from_join(e);
                error!("Fire on execution {} faulted: {}", id, fault);
                FireOutcome::failed(&fault)
            }
        }
    }

    /// Walks the handlers backward, starting from the last one.
    pub async fn roll_back(&self, context: StepContext) -> FireResult {
        let handlers = Arc::clone(&self.handlers);
        let id = context.execution.id;

        let task = tokio::spawn(async move {
            let mut context = context;
            match handlers.len().checked_sub(1) {
                Some(last) => {
                    debug!("Rollback {}: {}", id, handlers[last].stage());
                    handlers[last]
                        .roll_back(&mut context, Chain::at(&handlers, last))
                        .await
                }
                None => FireResult::rolled_back(),
            }
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                let fault = fault_from_join(e);
                error!("Rollback on execution {} faulted: {}", id, fault);
                FireResult::failed(&fault)
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages())
            .finish()
    }
}

fn fault_from_join(error: JoinError) -> FlowError {
    if error.is_panic() {
        FlowError::Fault(panic_message(error.into_panic()))
    } else {
        FlowError::Fault(error.to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
