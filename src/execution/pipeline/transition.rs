//! Transition validation stage: the matched detail must have been
//! completed by the activity stage, and the transition's condition, if
//! any, must hold.

use async_trait::async_trait;
use log::debug;

use super::{Chain, Stage, StepHandler};
use crate::error::FlowError;
use crate::execution::context::{FireResult, StepContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionHandler;

#[async_trait]
impl StepHandler for TransitionHandler {
    fn stage(&self) -> Stage {
        Stage::TransitionValidation
    }

    async fn handle(&self, context: &mut StepContext, chain: Chain<'_>) -> Result<FireResult, FlowError> {
        let transition = context.transition();

        if !context.detail.is_completed {
            return Err(FlowError::NotYetCompleted {
                from: transition.from.name.clone(),
                to: transition.to.name.clone(),
            });
        }

        if let Some(condition) = &transition.condition {
            // Evaluated once; no retry
            if !condition.evaluate() {
                return Err(FlowError::ConditionNotMet {
                    from: transition.from.name.clone(),
                    to: transition.to.name.clone(),
                });
            }
            debug!("Condition for '{}' -> '{}' holds", transition.from, transition.to);
        }

        chain.next(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::pipeline::Pipeline;
    use crate::execution::{Execution, StepData};
    use crate::error::ErrorKind;
    use crate::flow::{FlowBuilder, State};
    use std::sync::Arc;

    fn gated(open: bool) -> StepContext {
        let flow = FlowBuilder::new("gate")
            .state(State::new(1, "Open"))
            .initial(|s| s.for_state(State::new(0, "Closed")).allow_when(State::new(1, "Open"), 1, move || open))
            .build()
            .unwrap();
        let flow = Arc::new(flow);
        let execution = Execution::new(&flow);
        StepContext::new(flow, execution, 1, StepData::new()).unwrap()
    }

    fn validation() -> Pipeline {
        let handlers: Vec<Arc<dyn StepHandler>> = vec![Arc::new(TransitionHandler)];
        Pipeline::new(handlers)
    }

    #[tokio::test]
    async fn test_incomplete_detail_rejected() {
        let outcome = validation().fire(gated(true)).await;
        assert_eq!(outcome.result.kind, Some(ErrorKind::NotYetCompleted));
    }

    #[tokio::test]
    async fn test_condition_true_passes() {
        let mut context = gated(true);
        context.detail.is_completed = true;

        let outcome = validation().fire(context).await;
        assert!(outcome.result.is_completed());
    }

    #[tokio::test]
    async fn test_condition_false_fails() {
        let mut context = gated(false);
        context.detail.is_completed = true;

        let outcome = validation().fire(context).await;
        assert_eq!(outcome.result.kind, Some(ErrorKind::ConditionNotMet));
        assert!(outcome.result.message.contains("'Closed' -> 'Open'"));
    }
}
