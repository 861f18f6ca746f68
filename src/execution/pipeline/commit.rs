//! Persistence commit stage. The only stage that writes durable state.

use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::{Chain, Stage, StepHandler};
use crate::error::FlowError;
use crate::execution::context::{FireResult, StepContext};
use crate::execution::progress::ExecutionRecord;
use crate::storage::ExecutionRepository;

pub struct CommitHandler {
    executions: Arc<dyn ExecutionRepository>,
    max_depth: usize,
}

impl CommitHandler {
    pub fn new(executions: Arc<dyn ExecutionRepository>, max_depth: usize) -> Self {
        Self {
            executions,
            max_depth,
        }
    }
}

#[async_trait]
impl StepHandler for CommitHandler {
    fn stage(&self) -> Stage {
        Stage::PersistenceCommit
    }

    async fn handle(&self, context: &mut StepContext, chain: Chain<'_>) -> Result<FireResult, FlowError> {
        let flow = Arc::clone(&context.flow);
        let transition = context.transition().clone();

        let target = flow.step_for(transition.to.code).ok_or_else(|| {
            FlowError::Fault(format!(
                "Flow '{}' has no step for state {}",
                flow.key(),
                transition.to.code
            ))
        })?;

        context.execution.advance(transition.trigger, target)?;

        let record = ExecutionRecord::capture(&context.execution, self.max_depth)?;
        self.executions.save(record).await?;

        info!(
            "Execution {} moved '{}' -> '{}' ({:?})",
            context.execution.id, transition.from, transition.to, context.execution.execution_state
        );

        chain.next(context).await
    }
}
