//! Flow Builder
//!
//! Fluent construction of a [`Flow`]. Steps are described through closures
//! over a [`StepBuilder`]; [`FlowBuilder::build`] validates the graph and
//! returns an immutable flow or a [`DefinitionError`].
//!
//! # Example
//!
//! ```
//! use flowrunner::flow::{FlowBuilder, State};
//!
//! let draft = State::new(0, "Draft");
//! let review = State::new(1, "Review");
//! let approved = State::new(2, "Approved");
//!
//! let flow = FlowBuilder::new("approval")
//!     .initial(|step| step.for_state(draft.clone()).allow(review.clone(), 1))
//!     .new_step(|step| step.for_state(review.clone()).allow_when(approved.clone(), 2, || true))
//!     .state(approved.clone())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(flow.steps().len(), 3);
//! ```

use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use super::model::{ActivityRef, Condition, Flow, State, Step, Transition};
use super::validator::{collect_states, unique_states, unreachable_states, validate_definition};
use crate::activity::Activity;
use crate::error::DefinitionError;

/// Describes one step of a flow.
#[derive(Debug, Default)]
pub struct StepBuilder {
    state: Option<State>,
    allows: Vec<(State, i32, Option<Condition>)>,
    on_entry: Option<ActivityRef>,
    on_exit: Option<ActivityRef>,
}

impl StepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the step to a state.
    pub fn for_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    /// Allows a transition to `target` when `trigger` is fired.
    pub fn allow(mut self, target: State, trigger: i32) -> Self {
        self.allows.push((target, trigger, None));
        self
    }

    /// Allows a guarded transition. The condition must be pure.
    pub fn allow_when(
        mut self,
        target: State,
        trigger: i32,
        condition: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.allows
            .push((target, trigger, Some(Condition::new(condition))));
        self
    }

    /// Runs `activity` when the flow enters this step.
    pub fn on_entry<A: Activity + 'static>(self, activity: A) -> Self {
        self.on_entry_ref(ActivityRef::resolved(Arc::new(activity)))
    }

    /// Runs the activity registered under `name` when the flow enters this step.
    pub fn on_entry_named(self, name: impl Into<String>) -> Self {
        self.on_entry_ref(ActivityRef::named(name))
    }

    pub fn on_entry_ref(mut self, hook: ActivityRef) -> Self {
        self.on_entry = Some(hook);
        self
    }

    /// Runs `activity` when the flow leaves this step.
    pub fn on_exit<A: Activity + 'static>(self, activity: A) -> Self {
        self.on_exit_ref(ActivityRef::resolved(Arc::new(activity)))
    }

    /// Runs the activity registered under `name` when the flow leaves this step.
    pub fn on_exit_named(self, name: impl Into<String>) -> Self {
        self.on_exit_ref(ActivityRef::named(name))
    }

    pub fn on_exit_ref(mut self, hook: ActivityRef) -> Self {
        self.on_exit = Some(hook);
        self
    }

    fn build(self) -> Result<Step, DefinitionError> {
        let state = self.state.ok_or(DefinitionError::MissingState)?;

        let allowed = self
            .allows
            .into_iter()
            .map(|(target, trigger, condition)| Transition {
                from: state.clone(),
                to: target,
                trigger,
                condition,
            })
            .collect();

        Ok(Step {
            state,
            allowed,
            on_entry: self.on_entry,
            on_exit: self.on_exit,
        })
    }
}

/// Builds a validated [`Flow`].
#[derive(Debug)]
pub struct FlowBuilder {
    key: String,
    id: Option<Uuid>,
    declared: Vec<State>,
    initial: Option<StepBuilder>,
    steps: Vec<StepBuilder>,
}

impl FlowBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().trim().to_string(),
            id: None,
            declared: Vec::new(),
            initial: None,
            steps: Vec::new(),
        }
    }

    /// Uses a fixed id instead of a generated one.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Declares a state. Declared states without a step become terminal steps.
    pub fn state(mut self, state: State) -> Self {
        self.declared.push(state);
        self
    }

    /// Registers the start step.
    pub fn initial(mut self, spec: impl FnOnce(StepBuilder) -> StepBuilder) -> Self {
        if self.initial.is_some() {
            warn!("Flow '{}': initial step redefined", self.key);
        }
        self.initial = Some(spec(StepBuilder::new()));
        self
    }

    /// Registers an additional step.
    pub fn new_step(mut self, spec: impl FnOnce(StepBuilder) -> StepBuilder) -> Self {
        self.steps.push(spec(StepBuilder::new()));
        self
    }

    /// Validates the definition and produces the flow.
    pub fn build(self) -> Result<Flow, DefinitionError> {
        let initial = self
            .initial
            .ok_or_else(|| DefinitionError::MissingInitial(self.key.clone()))?;

        let mut steps = vec![initial.build()?];
        for spec in self.steps {
            steps.push(spec.build()?);
        }

        unique_states(&self.declared)?;
        let states = collect_states(&self.declared, &steps)?;
        validate_definition(&states, &steps)?;

        // Declared states without their own step are terminal
        for state in &states {
            if !steps.iter().any(|s| s.state.code == state.code) {
                debug!("Flow '{}': '{}' becomes a terminal step", self.key, state);
                steps.push(Step::terminal(state.clone()));
            }
        }

        let flow = Flow::new(self.id.unwrap_or_else(Uuid::new_v4), self.key, states, steps, 0);
        unreachable_states(&flow);

        info!(
            "Built flow '{}': {} states, {} transitions",
            flow.key(),
            flow.states().len(),
            flow.transitions().count()
        );

        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::NoopActivity;

    fn draft() -> State {
        State::new(0, "Draft")
    }

    fn review() -> State {
        State::new(1, "Review")
    }

    fn approved() -> State {
        State::new(2, "Approved")
    }

    #[test]
    fn test_build_approval_flow() {
        let flow = FlowBuilder::new("approval")
            .initial(|s| s.for_state(draft()).allow(review(), 1))
            .new_step(|s| s.for_state(review()).allow_when(approved(), 2, || true))
            .new_step(|s| s.for_state(approved()))
            .build()
            .unwrap();

        assert_eq!(flow.key(), "approval");
        assert_eq!(flow.initial().state, draft());
        assert_eq!(flow.steps().len(), 3);
        assert!(flow.transition(1, 2).unwrap().condition.is_some());
        assert!(flow.transition(0, 1).unwrap().condition.is_none());
    }

    #[test]
    fn test_missing_initial() {
        let result = FlowBuilder::new("empty")
            .new_step(|s| s.for_state(draft()))
            .build();

        assert_eq!(
            result.unwrap_err(),
            DefinitionError::MissingInitial("empty".to_string())
        );
    }

    #[test]
    fn test_missing_state() {
        let result = FlowBuilder::new("broken")
            .initial(|s| s.allow(review(), 1))
            .build();

        assert_eq!(result.unwrap_err(), DefinitionError::MissingState);
    }

    #[test]
    fn test_undefined_target() {
        let result = FlowBuilder::new("dangling")
            .initial(|s| s.for_state(draft()).allow(review(), 1))
            .build();

        assert_eq!(
            result.unwrap_err(),
            DefinitionError::UndefinedTarget { from: 0, target: 1 }
        );
    }

    #[test]
    fn test_duplicate_state_code() {
        let result = FlowBuilder::new("clash")
            .initial(|s| s.for_state(draft()).allow(review(), 1))
            .new_step(|s| s.for_state(review()))
            .state(State::new(1, "Checking"))
            .build();

        assert!(matches!(
            result,
            Err(DefinitionError::DuplicateStateCode { code: 1, .. })
        ));
    }

    #[test]
    fn test_state_declared_twice() {
        let result = FlowBuilder::new("twice")
            .state(review())
            .state(review())
            .initial(|s| s.for_state(draft()).allow(review(), 1))
            .build();

        assert!(matches!(
            result,
            Err(DefinitionError::DuplicateStateCode { code: 1, .. })
        ));
    }

    #[test]
    fn test_misspelled_target_rejected() {
        let result = FlowBuilder::new("typo")
            .initial(|s| s.for_state(draft()).allow(State::new(1, "Reveiw"), 1))
            .new_step(|s| s.for_state(review()))
            .build();

        assert!(matches!(
            result,
            Err(DefinitionError::DuplicateStateCode { code: 1, ref second, .. }) if second == "Reveiw"
        ));
    }

    #[test]
    fn test_declared_state_becomes_terminal_step() {
        let flow = FlowBuilder::new("implicit")
            .initial(|s| s.for_state(draft()).allow(approved(), 1))
            .state(approved())
            .build()
            .unwrap();

        let terminal = flow.step_for(2).unwrap();
        assert!(terminal.is_terminal());
        assert!(terminal.on_entry.is_none());
    }

    #[test]
    fn test_hooks_attached() {
        let flow = FlowBuilder::new("hooks")
            .initial(|s| {
                s.for_state(draft())
                    .allow(review(), 1)
                    .on_exit(NoopActivity)
            })
            .new_step(|s| s.for_state(review()).on_entry_named("log"))
            .build()
            .unwrap();

        let exit = flow.initial().on_exit.as_ref().unwrap();
        assert_eq!(exit.name, "noop");
        assert!(exit.is_resolved());

        let entry = flow.step_for(1).unwrap().on_entry.as_ref().unwrap();
        assert_eq!(entry.name, "log");
        assert!(!entry.is_resolved());
    }

    #[test]
    fn test_with_id() {
        let id = Uuid::new_v4();
        let flow = FlowBuilder::new("fixed")
            .with_id(id)
            .initial(|s| s.for_state(draft()).allow(review(), 1))
            .state(review())
            .build()
            .unwrap();

        assert_eq!(flow.id(), id);
    }

    #[test]
    fn test_initial_redefined_keeps_last() {
        let flow = FlowBuilder::new("redefined")
            .initial(|s| s.for_state(draft()).allow(review(), 1))
            .initial(|s| s.for_state(review()).allow(draft(), 2))
            .state(draft())
            .build()
            .unwrap();

        assert_eq!(flow.initial().state, review());
    }
}
