//! Step Context and Fire Results
//!
//! The [`StepContext`] travels through the handler pipeline during a fire.
//! It owns a working copy of the execution; the copy replaces the caller's
//! execution only when the fire completes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::model::{Execution, ExecutionState, ExecutionStep, ExecutionStepDetail};
use crate::activity::{ActivityContext, Hook};
use crate::error::{ErrorKind, FlowError};
use crate::flow::{Flow, State, Step, Transition};

/// The party firing an action.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Actor used for engine-initiated fires.
    pub fn system() -> Self {
        Self::new("system")
    }
}

/// Caller data attached to a fire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepData {
    pub values: HashMap<String, Value>,
    pub actor: Option<Actor>,
}

impl StepData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Attributes the fire to `actor`.
    pub fn by(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// Outcome of a fire or a rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct FireResult {
    pub status: ResultStatus,
    pub message: String,

    /// Classification of the failure, if any
    pub kind: Option<ErrorKind>,

    /// State after a completed fire
    pub state: Option<State>,
    pub execution_state: Option<ExecutionState>,
}

impl FireResult {
    pub fn completed(execution: &Execution) -> Self {
        let state = execution.state().cloned();
        Self {
            status: ResultStatus::Completed,
            message: match &state {
                Some(state) => format!("Moved to '{}'", state),
                None => "Completed".to_string(),
            },
            kind: None,
            state,
            execution_state: Some(execution.execution_state),
        }
    }

    pub fn failed(error: &FlowError) -> Self {
        Self {
            status: ResultStatus::Failed,
            message: error.to_string(),
            kind: Some(error.kind()),
            state: None,
            execution_state: None,
        }
    }

    /// Result of a rollback that walked back to the first handler.
    pub fn rolled_back() -> Self {
        Self {
            status: ResultStatus::Failed,
            message: "Fire rolled back".to_string(),
            kind: None,
            state: None,
            execution_state: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ResultStatus::Failed
    }
}

/// Everything a handler needs for one fire.
#[derive(Debug)]
pub struct StepContext {
    pub flow: Arc<Flow>,

    /// Working copy of the execution
    pub execution: Execution,

    /// Index of the active step in `execution.steps`
    pub step_index: usize,

    /// Working copy of the matched detail
    pub detail: ExecutionStepDetail,

    pub data: StepData,
}

impl StepContext {
    /// Matches `action` against the active step of `execution`.
    pub fn new(flow: Arc<Flow>, mut execution: Execution, action: i32, data: StepData) -> Result<Self, FlowError> {
        if execution.execution_state == ExecutionState::Suspended {
            return Err(FlowError::Suspended(execution.id));
        }

        let step_index = execution
            .active_step_index()
            .ok_or(FlowError::NoActiveStep(execution.id))?;

        execution.rehydrate(&flow);

        let detail = execution.steps[step_index]
            .detail_for(action)
            .cloned()
            .ok_or_else(|| FlowError::InvalidAction {
                action,
                state: execution
                    .state()
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
            })?;

        Ok(Self {
            flow,
            execution,
            step_index,
            detail,
            data,
        })
    }

    pub fn active_step(&self) -> &ExecutionStep {
        &self.execution.steps[self.step_index]
    }

    pub fn transition(&self) -> &Transition {
        &self.detail.transition
    }

    /// Definition step being left.
    pub fn source_step(&self) -> Option<&Step> {
        self.flow.step_for(self.detail.transition.from.code)
    }

    /// Definition step being entered.
    pub fn target_step(&self) -> Option<&Step> {
        self.flow.step_for(self.detail.transition.to.code)
    }

    pub fn activity_context(&self, hook: Hook) -> ActivityContext {
        let transition = self.transition();
        ActivityContext {
            execution_id: self.execution.id,
            flow_key: self.flow.key().to_string(),
            hook,
            from: transition.from.clone(),
            to: transition.to.clone(),
            trigger: transition.trigger,
            data: self.data.values.clone(),
            actor: self.data.actor.clone(),
        }
    }
}
