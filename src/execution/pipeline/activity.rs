//! Activity execution stage.
//!
//! Runs the OnExit hook of the step being left, then the OnEntry hook of
//! the step being entered. Name-only hooks are resolved at this point.
//! Any failure aborts the fire before anything is committed.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};

use super::{Chain, Stage, StepHandler};
use crate::activity::{Activity, ActivityContext, ActivityResolver, Hook};
use crate::error::FlowError;
use crate::execution::context::{FireResult, StepContext};
use crate::flow::ActivityRef;

pub struct ActivityHandler {
    resolver: Arc<ActivityResolver>,
}

impl ActivityHandler {
    pub fn new(resolver: Arc<ActivityResolver>) -> Self {
        Self { resolver }
    }

    async fn instance(&self, hook: &ActivityRef) -> Result<Arc<dyn Activity>, FlowError> {
        match &hook.instance {
            Some(activity) => Ok(Arc::clone(activity)),
            None => Ok(self.resolver.resolve(&hook.name).await?),
        }
    }

    async fn invoke(&self, hook: &ActivityRef, context: ActivityContext) -> Result<(), FlowError> {
        let activity = self.instance(hook).await?;
        debug!("Invoking {} activity '{}'", context.hook, hook.name);

        activity.invoke(&context).await.map_err(|source| {
            error!("Activity '{}' failed: {}", hook.name, source);
            FlowError::Activity {
                name: hook.name.clone(),
                source,
            }
        })
    }

    async fn compensate(&self, hook: &ActivityRef, context: ActivityContext) -> Result<(), FlowError> {
        let activity = self.instance(hook).await?;
        info!("Compensating {} activity '{}'", context.hook, hook.name);

        activity
            .compensate(&context)
            .await
            .map_err(|source| FlowError::Activity {
                name: hook.name.clone(),
                source,
            })
    }

    /// The (hook kind, reference) pairs of the matched transition, in run order.
    fn hooks(context: &StepContext) -> Vec<(Hook, ActivityRef)> {
        let mut hooks = Vec::new();
        if let Some(exit) = context.source_step().and_then(|s| s.on_exit.clone()) {
            hooks.push((Hook::Exit, exit));
        }
        if let Some(entry) = context.target_step().and_then(|s| s.on_entry.clone()) {
            hooks.push((Hook::Entry, entry));
        }
        hooks
    }
}

#[async_trait]
impl StepHandler for ActivityHandler {
    fn stage(&self) -> Stage {
        Stage::ActivityExecution
    }

    async fn handle(&self, context: &mut StepContext, chain: Chain<'_>) -> Result<FireResult, FlowError> {
        for (hook, activity) in Self::hooks(context) {
            self.invoke(&activity, context.activity_context(hook)).await?;
        }

        context.detail.is_completed = true;
        chain.next(context).await
    }

    async fn roll_back(&self, context: &mut StepContext, chain: Chain<'_>) -> FireResult {
        for (hook, activity) in Self::hooks(context).into_iter().rev() {
            if let Err(e) = self.compensate(&activity, context.activity_context(hook)).await {
                error!("Rollback stopped at '{}': {}", activity.name, e);
                return FireResult::failed(&e);
            }
        }

        chain.previous(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::execution::pipeline::Pipeline;
    use crate::execution::{Execution, StepData};
    use crate::flow::{FlowBuilder, State};
    use crate::testing::{FailingActivity, RecordingActivity};

    fn pipeline() -> Pipeline {
        let handlers: Vec<Arc<dyn StepHandler>> =
            vec![Arc::new(ActivityHandler::new(Arc::new(ActivityResolver::default())))];
        Pipeline::new(handlers)
    }

    fn context_for(builder: FlowBuilder) -> StepContext {
        let flow = Arc::new(builder.build().unwrap());
        let execution = Execution::new(&flow);
        StepContext::new(flow, execution, 1, StepData::new()).unwrap()
    }

    #[tokio::test]
    async fn test_exit_runs_before_entry() {
        let recorder = RecordingActivity::new("recorder");
        let builder = FlowBuilder::new("hooks")
            .initial(|s| {
                s.for_state(State::new(0, "Draft"))
                    .allow(State::new(1, "Review"), 1)
                    .on_exit(recorder.clone())
            })
            .new_step(|s| {
                s.for_state(State::new(1, "Review"))
                    .allow(State::new(0, "Draft"), 2)
                    .on_entry(recorder.clone())
            });

        let outcome = pipeline().fire(context_for(builder)).await;

        assert!(outcome.result.is_completed());
        assert_eq!(recorder.calls(), vec!["exit Draft->Review", "entry Draft->Review"]);

        let execution = outcome.execution.unwrap();
        // Only the context's detail is marked here; committing is a later stage
        assert!(!execution.steps[0].is_completed);
    }

    #[tokio::test]
    async fn test_failing_activity_aborts() {
        let builder = FlowBuilder::new("hooks").initial(|s| {
            s.for_state(State::new(0, "Draft"))
                .allow(State::new(1, "Review"), 1)
                .on_exit(FailingActivity::new("smtp down"))
        })
        .state(State::new(1, "Review"));

        let outcome = pipeline().fire(context_for(builder)).await;

        assert_eq!(outcome.result.kind, Some(ErrorKind::Activity));
        assert!(outcome.result.message.contains("smtp down"));
    }

    #[tokio::test]
    async fn test_named_hook_resolved_at_fire() {
        let builder = FlowBuilder::new("hooks")
            .initial(|s| {
                s.for_state(State::new(0, "Draft"))
                    .allow(State::new(1, "Review"), 1)
                    .on_exit_named("log")
            })
            .state(State::new(1, "Review"));

        assert!(pipeline().fire(context_for(builder)).await.result.is_completed());
    }

    #[tokio::test]
    async fn test_unresolvable_hook_aborts() {
        let builder = FlowBuilder::new("hooks")
            .initial(|s| {
                s.for_state(State::new(0, "Draft"))
                    .allow(State::new(1, "Review"), 1)
                    .on_exit_named("missing")
            })
            .state(State::new(1, "Review"));

        let outcome = pipeline().fire(context_for(builder)).await;
        assert_eq!(outcome.result.kind, Some(ErrorKind::Resolution));
    }

    #[tokio::test]
    async fn test_roll_back_compensates_in_reverse() {
        let recorder = RecordingActivity::new("recorder");
        let builder = FlowBuilder::new("hooks")
            .initial(|s| {
                s.for_state(State::new(0, "Draft"))
                    .allow(State::new(1, "Review"), 1)
                    .on_exit(recorder.clone())
            })
            .new_step(|s| {
                s.for_state(State::new(1, "Review"))
                    .allow(State::new(0, "Draft"), 2)
                    .on_entry(recorder.clone())
            });

        let result = pipeline().roll_back(context_for(builder)).await;

        assert!(result.is_failed());
        assert_eq!(result.message, "Fire rolled back");
        assert_eq!(
            recorder.calls(),
            vec!["compensate entry Draft->Review", "compensate exit Draft->Review"]
        );
    }

    #[tokio::test]
    async fn test_failing_compensation_stops_walk() {
        let builder = FlowBuilder::new("hooks").initial(|s| {
            s.for_state(State::new(0, "Draft"))
                .allow(State::new(1, "Review"), 1)
                .on_exit(FailingActivity::new("ledger locked"))
        })
        .state(State::new(1, "Review"));

        let result = pipeline().roll_back(context_for(builder)).await;

        assert!(result.is_failed());
        assert!(result.message.contains("ledger locked"));
    }
}
