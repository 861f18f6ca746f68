//! Execution Data Model
//!
//! An [`Execution`] is one traversal of a [`Flow`]. Its progress is an
//! ordered list of [`ExecutionStep`]s; at most one of them is incomplete
//! and that one is the active step.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FlowError;
use crate::flow::{Flow, State, Step, Transition};

/// Lifecycle of an execution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Initial,
    Pending,
    Running,
    Suspended,
    Finished,
}

/// One candidate transition of an execution step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStepDetail {
    pub transition: Transition,
    pub is_completed: bool,
}

/// The execution's stay in one state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub created_on: DateTime<Utc>,
    pub is_completed: bool,
    pub details: Vec<ExecutionStepDetail>,
}

impl ExecutionStep {
    /// Creates an incomplete step offering every transition of `step`.
    pub fn for_step(step: &Step) -> Self {
        Self {
            created_on: Utc::now(),
            is_completed: false,
            details: step
                .allowed
                .iter()
                .map(|transition| ExecutionStepDetail {
                    transition: transition.clone(),
                    is_completed: false,
                })
                .collect(),
        }
    }

    /// Finds the detail fired by `trigger`.
    pub fn detail_for(&self, trigger: i32) -> Option<&ExecutionStepDetail> {
        self.details.iter().find(|d| d.transition.trigger == trigger)
    }

    fn detail_for_mut(&mut self, trigger: i32) -> Option<&mut ExecutionStepDetail> {
        self.details
            .iter_mut()
            .find(|d| d.transition.trigger == trigger)
    }

    /// The detail that was taken, if any.
    pub fn completed_detail(&self) -> Option<&ExecutionStepDetail> {
        self.details.iter().find(|d| d.is_completed)
    }
}

/// A running or completed instance of a flow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: Uuid,
    pub flow_id: Uuid,

    /// Caller-chosen lookup scope, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    pub created_on: DateTime<Utc>,
    pub execution_state: ExecutionState,
    pub steps: Vec<ExecutionStep>,
}

impl Execution {
    /// Starts an execution at the flow's initial step.
    pub fn new(flow: &Flow) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow_id: flow.id(),
            scope: None,
            created_on: Utc::now(),
            execution_state: ExecutionState::Initial,
            steps: vec![ExecutionStep::for_step(flow.initial())],
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Index of the single incomplete step.
    pub fn active_step_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| !s.is_completed)
    }

    pub fn active_step(&self) -> Option<&ExecutionStep> {
        self.active_step_index().map(|i| &self.steps[i])
    }

    /// The state the execution currently occupies.
    ///
    /// Derived from the most recently created step: the source state of its
    /// first detail while it is active, or the target of the taken detail
    /// once the execution has finished.
    pub fn state(&self) -> Option<&State> {
        let latest = self.steps.iter().max_by_key(|s| s.created_on)?;

        if latest.is_completed {
            latest.completed_detail().map(|d| &d.transition.to)
        } else {
            latest.details.first().map(|d| &d.transition.from)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.execution_state == ExecutionState::Finished
    }

    /// Takes the transition fired by `trigger` from the active step.
    ///
    /// Completes the matching detail and its step, then either opens a step
    /// for `target` or finishes the execution when `target` is terminal.
    pub fn advance(&mut self, trigger: i32, target: &Step) -> Result<(), FlowError> {
        let index = self
            .active_step_index()
            .ok_or(FlowError::NoActiveStep(self.id))?;
        let state_name = self
            .state()
            .map(|s| s.name.clone())
            .unwrap_or_default();

        let active = &mut self.steps[index];
        let detail = active
            .detail_for_mut(trigger)
            .ok_or(FlowError::InvalidAction {
                action: trigger,
                state: state_name,
            })?;
        detail.is_completed = true;
        active.is_completed = true;

        if target.is_terminal() {
            debug!("Execution {} reached terminal state '{}'", self.id, target.state);
            self.execution_state = ExecutionState::Finished;
        } else {
            self.steps.push(ExecutionStep::for_step(target));
            if matches!(
                self.execution_state,
                ExecutionState::Initial | ExecutionState::Pending
            ) {
                self.execution_state = ExecutionState::Running;
            }
        }

        Ok(())
    }

    /// Marks a freshly instantiated execution as queued.
    pub fn mark_pending(&mut self) -> Result<(), FlowError> {
        self.change_state(&[ExecutionState::Initial], ExecutionState::Pending)
    }

    /// Pauses the execution. Suspended executions refuse fires.
    pub fn suspend(&mut self) -> Result<(), FlowError> {
        self.change_state(
            &[
                ExecutionState::Initial,
                ExecutionState::Pending,
                ExecutionState::Running,
            ],
            ExecutionState::Suspended,
        )
    }

    pub fn resume(&mut self) -> Result<(), FlowError> {
        self.change_state(&[ExecutionState::Suspended], ExecutionState::Running)
    }

    fn change_state(&mut self, allowed: &[ExecutionState], to: ExecutionState) -> Result<(), FlowError> {
        if !allowed.contains(&self.execution_state) {
            return Err(FlowError::IllegalState {
                id: self.id,
                from: self.execution_state,
                to,
            });
        }
        self.execution_state = to;
        Ok(())
    }

    /// Re-links transition conditions from the flow definition.
    ///
    /// Conditions are not persisted, so executions loaded from storage have
    /// none until rehydrated.
    pub fn rehydrate(&mut self, flow: &Flow) {
        for detail in self.steps.iter_mut().flat_map(|s| s.details.iter_mut()) {
            let transition = &mut detail.transition;
            transition.condition = flow
                .transition(transition.from.code, transition.trigger)
                .filter(|t| t.to.code == transition.to.code)
                .and_then(|t| t.condition.clone());
        }
    }
}
