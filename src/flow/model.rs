//! Flow Data Model
//!
//! Immutable definition types: states, transitions, steps and the flow
//! graph that ties them together. A [`Flow`] is produced once by the
//! [`FlowBuilder`](super::FlowBuilder) and shared read-only by every
//! execution that references it.
//!
//! # Example JSON Format
//!
//! ```json
//! {
//!   "key": "approval",
//!   "states": [ { "code": 0, "name": "Draft" }, { "code": 1, "name": "Review" } ],
//!   "initial": { "fromStateCode": 0, "allows": [ { "allowedStateCode": 1, "triggerCode": 1 } ] },
//!   "steps": []
//! }
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::Activity;

/// A named state of a flow. Identity is the code.
#[derive(Serialize, Deserialize, Debug, Clone, Eq)]
pub struct State {
    pub code: i32,
    pub name: String,
}

impl State {
    pub fn new(code: i32, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into().trim().to_string(),
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Side-effect free predicate guarding a transition.
///
/// May be evaluated more than once, so it must be idempotent.
#[derive(Clone)]
pub struct Condition(Arc<dyn Fn() -> bool + Send + Sync>);

impl Condition {
    pub fn new(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn evaluate(&self) -> bool {
        (self.0)()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition(..)")
    }
}

/// An edge of the flow graph, taken when its trigger is fired.
///
/// The condition is not serialized; executions loaded from storage get it
/// back from the flow through [`Execution::rehydrate`](crate::execution::Execution::rehydrate).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Transition {
    pub from: State,
    pub to: State,
    pub trigger: i32,
    #[serde(skip)]
    pub condition: Option<Condition>,
}

impl Transition {
    pub fn new(from: State, to: State, trigger: i32) -> Self {
        Self {
            from,
            to,
            trigger,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

// Conditions are opaque, so equality only covers the edge itself.
impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to && self.trigger == other.trigger
    }
}

/// A step hook: the activity name plus, once resolved, the instance.
///
/// Name-only references are resolved when the hook is invoked.
#[derive(Clone)]
pub struct ActivityRef {
    pub name: String,
    pub instance: Option<Arc<dyn Activity>>,
}

impl ActivityRef {
    /// A reference resolved later by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            instance: None,
        }
    }

    /// A reference bound to an instance, named after the activity.
    pub fn resolved(activity: Arc<dyn Activity>) -> Self {
        Self {
            name: activity.name().to_string(),
            instance: Some(activity),
        }
    }

    /// A reference bound to an instance under an explicit name.
    pub fn resolved_as(name: impl Into<String>, activity: Arc<dyn Activity>) -> Self {
        Self {
            name: name.into(),
            instance: Some(activity),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.instance.is_some()
    }
}

impl fmt::Debug for ActivityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityRef")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// A node of the flow graph bound to one state.
#[derive(Debug, Clone)]
pub struct Step {
    /// State this step is for
    pub state: State,

    /// Outgoing transitions, in declaration order
    pub allowed: Vec<Transition>,

    /// Activity run when the flow enters this step
    pub on_entry: Option<ActivityRef>,

    /// Activity run when the flow leaves this step
    pub on_exit: Option<ActivityRef>,
}

impl Step {
    /// A step with no transitions and no hooks.
    pub fn terminal(state: State) -> Self {
        Self {
            state,
            allowed: Vec::new(),
            on_entry: None,
            on_exit: None,
        }
    }

    /// Returns true if no transition leaves this step.
    pub fn is_terminal(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Finds the transition fired by `trigger`.
    pub fn transition_for(&self, trigger: i32) -> Option<&Transition> {
        self.allowed.iter().find(|t| t.trigger == trigger)
    }

    /// Trigger codes accepted by this step.
    pub fn triggers(&self) -> Vec<i32> {
        self.allowed.iter().map(|t| t.trigger).collect()
    }
}

/// A validated, immutable flow definition.
#[derive(Debug, Clone)]
pub struct Flow {
    id: Uuid,
    key: String,
    states: Vec<State>,
    steps: Vec<Step>,
    initial: usize,
}

impl Flow {
    /// Assembles a flow. Callers must have validated the graph.
    pub(crate) fn new(id: Uuid, key: String, states: Vec<State>, steps: Vec<Step>, initial: usize) -> Self {
        Self {
            id,
            key,
            states,
            steps,
            initial,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Human lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All states, in declaration order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// All steps, the initial one included.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn initial(&self) -> &Step {
        &self.steps[self.initial]
    }

    /// Gets a state by code.
    pub fn state(&self, code: i32) -> Option<&State> {
        self.states.iter().find(|s| s.code == code)
    }

    /// Gets the step bound to a state code.
    pub fn step_for(&self, code: i32) -> Option<&Step> {
        self.steps.iter().find(|s| s.state.code == code)
    }

    /// Finds the transition leaving `from` on `trigger`.
    pub fn transition(&self, from: i32, trigger: i32) -> Option<&Transition> {
        self.step_for(from).and_then(|s| s.transition_for(trigger))
    }

    /// Iterates over every transition of the flow.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.steps.iter().flat_map(|s| s.allowed.iter())
    }

    /// Returns steps with no outgoing transitions.
    pub fn terminal_steps(&self) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.is_terminal()).collect()
    }
}
