//! Flow Validation
//!
//! Graph integrity checks run by [`FlowBuilder::build`](super::FlowBuilder::build):
//! - State codes are unique
//! - Each state has at most one step
//! - Every transition targets a defined state under its declared name
//! - Trigger codes are unambiguous within a step
//! - The initial step can be fired

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};

use super::model::{Flow, State, Step};
use crate::error::DefinitionError;

/// Rejects a state list that repeats a code, even with the same name.
pub fn unique_states(declared: &[State]) -> Result<(), DefinitionError> {
    let mut names: HashMap<i32, &str> = HashMap::new();

    for state in declared {
        if let Some(first) = names.insert(state.code, state.name.as_str()) {
            return Err(DefinitionError::DuplicateStateCode {
                code: state.code,
                first: first.to_string(),
                second: state.name.clone(),
            });
        }
    }

    Ok(())
}

/// Merges declared states with the states steps are bound to.
///
/// Returns the states in first-seen order. A code reused with a different
/// name is rejected.
pub fn collect_states(declared: &[State], steps: &[Step]) -> Result<Vec<State>, DefinitionError> {
    let mut states: Vec<State> = Vec::new();
    let mut names: HashMap<i32, String> = HashMap::new();

    for state in declared.iter().chain(steps.iter().map(|s| &s.state)) {
        match names.get(&state.code) {
            Some(existing) if *existing != state.name => {
                return Err(DefinitionError::DuplicateStateCode {
                    code: state.code,
                    first: existing.clone(),
                    second: state.name.clone(),
                });
            }
            Some(_) => {}
            None => {
                names.insert(state.code, state.name.clone());
                states.push(state.clone());
            }
        }
    }

    Ok(states)
}

/// Validates steps against the known state set.
///
/// `steps[0]` must be the initial step.
pub fn validate_definition(states: &[State], steps: &[Step]) -> Result<(), DefinitionError> {
    let known: HashMap<i32, &str> = states.iter().map(|s| (s.code, s.name.as_str())).collect();

    // Check for duplicate steps
    let mut seen_steps: HashSet<i32> = HashSet::new();
    for step in steps {
        if !seen_steps.insert(step.state.code) {
            return Err(DefinitionError::DuplicateStep(step.state.code));
        }
    }

    for step in steps {
        let mut triggers: HashSet<i32> = HashSet::new();

        for transition in &step.allowed {
            match known.get(&transition.to.code) {
                None => {
                    return Err(DefinitionError::UndefinedTarget {
                        from: step.state.code,
                        target: transition.to.code,
                    });
                }
                Some(name) if *name != transition.to.name => {
                    return Err(DefinitionError::DuplicateStateCode {
                        code: transition.to.code,
                        first: name.to_string(),
                        second: transition.to.name.clone(),
                    });
                }
                Some(_) => {}
            }

            if !triggers.insert(transition.trigger) {
                return Err(DefinitionError::DuplicateTrigger {
                    state: step.state.code,
                    trigger: transition.trigger,
                });
            }
        }

        if step.is_terminal() {
            debug!("Step '{}' is terminal (no allowed transitions)", step.state);
        }
    }

    if let Some(initial) = steps.first() {
        if initial.is_terminal() {
            return Err(DefinitionError::TerminalInitial(initial.state.code));
        }
    }

    Ok(())
}

/// Returns states that cannot be reached from the initial step.
///
/// Unreachable states are legal; the builder only warns about them.
pub fn unreachable_states(flow: &Flow) -> Vec<State> {
    let mut visited: HashSet<i32> = HashSet::new();
    let mut queue: VecDeque<i32> = VecDeque::new();

    queue.push_back(flow.initial().state.code);
    visited.insert(flow.initial().state.code);

    while let Some(code) = queue.pop_front() {
        let Some(step) = flow.step_for(code) else {
            continue;
        };

        for transition in &step.allowed {
            if visited.insert(transition.to.code) {
                queue.push_back(transition.to.code);
            }
        }
    }

    let unreachable: Vec<State> = flow
        .states()
        .iter()
        .filter(|s| !visited.contains(&s.code))
        .cloned()
        .collect();

    for state in &unreachable {
        warn!(
            "Flow '{}': state '{}' is unreachable from the initial step",
            flow.key(),
            state
        );
    }

    unreachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::model::Transition;
    use crate::flow::FlowBuilder;

    fn draft() -> State {
        State::new(0, "Draft")
    }

    fn review() -> State {
        State::new(1, "Review")
    }

    fn step(state: State, targets: &[(State, i32)]) -> Step {
        let mut step = Step::terminal(state.clone());
        step.allowed = targets
            .iter()
            .map(|(to, trigger)| Transition::new(state.clone(), to.clone(), *trigger))
            .collect();
        step
    }

    #[test]
    fn test_collect_states_dedupes() {
        let steps = vec![step(draft(), &[(review(), 1)]), step(review(), &[])];
        let states = collect_states(&[draft()], &steps).unwrap();

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].name, "Draft");
    }

    #[test]
    fn test_collect_states_conflicting_names() {
        let result = collect_states(&[draft(), State::new(0, "Other")], &[]);
        assert!(matches!(
            result,
            Err(DefinitionError::DuplicateStateCode { code: 0, .. })
        ));
    }

    #[test]
    fn test_unique_states_rejects_repeated_code() {
        assert!(unique_states(&[draft(), review()]).is_ok());

        let result = unique_states(&[draft(), review(), draft()]);
        assert_eq!(
            result,
            Err(DefinitionError::DuplicateStateCode {
                code: 0,
                first: "Draft".to_string(),
                second: "Draft".to_string(),
            })
        );
    }

    #[test]
    fn test_target_name_must_match_declared() {
        let steps = vec![step(draft(), &[(State::new(1, "Reveiw"), 1)]), step(review(), &[])];
        let result = validate_definition(&[draft(), review()], &steps);

        assert!(matches!(
            result,
            Err(DefinitionError::DuplicateStateCode { code: 1, ref second, .. }) if second == "Reveiw"
        ));
    }

    #[test]
    fn test_valid_definition() {
        let steps = vec![step(draft(), &[(review(), 1)]), step(review(), &[])];
        assert!(validate_definition(&[draft(), review()], &steps).is_ok());
    }

    #[test]
    fn test_undefined_target() {
        let steps = vec![step(draft(), &[(State::new(5, "Ghost"), 1)])];
        let result = validate_definition(&[draft()], &steps);

        assert_eq!(
            result,
            Err(DefinitionError::UndefinedTarget { from: 0, target: 5 })
        );
    }

    #[test]
    fn test_duplicate_step() {
        let steps = vec![step(draft(), &[(review(), 1)]), step(draft(), &[])];
        let result = validate_definition(&[draft(), review()], &steps);

        assert_eq!(result, Err(DefinitionError::DuplicateStep(0)));
    }

    #[test]
    fn test_duplicate_trigger() {
        let done = State::new(2, "Done");
        let steps = vec![step(draft(), &[(review(), 1), (done.clone(), 1)])];
        let result = validate_definition(&[draft(), review(), done], &steps);

        assert_eq!(
            result,
            Err(DefinitionError::DuplicateTrigger { state: 0, trigger: 1 })
        );
    }

    #[test]
    fn test_terminal_initial() {
        let steps = vec![step(draft(), &[])];
        let result = validate_definition(&[draft()], &steps);

        assert_eq!(result, Err(DefinitionError::TerminalInitial(0)));
    }

    #[test]
    fn test_unreachable_states() {
        let flow = FlowBuilder::new("orphans")
            .state(State::new(9, "Archived"))
            .initial(|s| s.for_state(draft()).allow(review(), 1))
            .new_step(|s| s.for_state(review()))
            .build()
            .unwrap();

        let unreachable = unreachable_states(&flow);
        assert_eq!(unreachable.len(), 1);
        assert_eq!(unreachable[0].code, 9);
    }
}
