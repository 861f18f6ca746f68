//! Execution Progress Persistence
//!
//! The ordered step list is the sole durable representation of an
//! execution's progress. It is stored as a JSON document whose nesting is
//! bounded, so that oversized or hostile payloads are rejected instead of
//! recursed into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::model::{Execution, ExecutionState, ExecutionStep};
use crate::error::StorageError;

/// Default nesting bound for progress documents.
pub const DEFAULT_MAX_DEPTH: usize = 7;

/// Depth of a well-formed progress document: steps, step, details,
/// detail, transition, state.
pub const MIN_PROGRESS_DEPTH: usize = 6;

/// Nesting depth of a JSON value. Scalars have depth 0.
pub fn json_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        Value::Object(fields) => 1 + fields.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn check_depth(value: &Value, limit: usize) -> Result<(), StorageError> {
    let depth = json_depth(value);
    if depth > limit {
        return Err(StorageError::DepthExceeded { depth, limit });
    }
    Ok(())
}

/// Serializes the step list.
pub fn serialize_progress(steps: &[ExecutionStep], max_depth: usize) -> Result<String, StorageError> {
    let value = serde_json::to_value(steps)?;
    check_depth(&value, max_depth)?;
    Ok(serde_json::to_string(&value)?)
}

/// Parses a step list, rejecting documents nested deeper than `max_depth`.
pub fn deserialize_progress(json: &str, max_depth: usize) -> Result<Vec<ExecutionStep>, StorageError> {
    let value: Value = serde_json::from_str(json)?;
    check_depth(&value, max_depth)?;
    Ok(serde_json::from_value(value)?)
}

/// The persisted row of an execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub flow_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub created_on: DateTime<Utc>,
    pub execution_state: ExecutionState,

    /// Serialized step list
    pub progress: String,
}

impl ExecutionRecord {
    /// Captures an execution for storage.
    pub fn capture(execution: &Execution, max_depth: usize) -> Result<Self, StorageError> {
        Ok(Self {
            id: execution.id,
            flow_id: execution.flow_id,
            scope: execution.scope.clone(),
            created_on: execution.created_on,
            execution_state: execution.execution_state,
            progress: serialize_progress(&execution.steps, max_depth)?,
        })
    }

    /// Rebuilds the in-memory execution. Conditions still need
    /// [`Execution::rehydrate`].
    pub fn restore(&self, max_depth: usize) -> Result<Execution, StorageError> {
        Ok(Execution {
            id: self.id,
            flow_id: self.flow_id,
            scope: self.scope.clone(),
            created_on: self.created_on,
            execution_state: self.execution_state,
            steps: deserialize_progress(&self.progress, max_depth)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::approval_flow;

    #[test]
    fn test_json_depth() {
        assert_eq!(json_depth(&serde_json::json!(1)), 0);
        assert_eq!(json_depth(&serde_json::json!([])), 1);
        assert_eq!(json_depth(&serde_json::json!({"a": [{"b": 1}]})), 3);
    }

    #[test]
    fn test_progress_fits_default_depth() {
        let flow = approval_flow();
        let mut execution = Execution::new(&flow);
        execution.advance(1, flow.step_for(1).unwrap()).unwrap();

        let json = serialize_progress(&execution.steps, DEFAULT_MAX_DEPTH).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(json_depth(&value), MIN_PROGRESS_DEPTH);

        let steps = deserialize_progress(&json, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(steps, execution.steps);
    }

    #[test]
    fn test_serialize_rejects_small_limit() {
        let flow = approval_flow();
        let execution = Execution::new(&flow);

        let result = serialize_progress(&execution.steps, 3);
        assert!(matches!(
            result,
            Err(StorageError::DepthExceeded { limit: 3, .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_deep_document() {
        let deep = "[[[[[[[[[[[[[[[[]]]]]]]]]]]]]]]]";
        let result = deserialize_progress(deep, DEFAULT_MAX_DEPTH);
        assert!(matches!(result, Err(StorageError::DepthExceeded { .. })));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let result = deserialize_progress("not json", DEFAULT_MAX_DEPTH);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_record_capture_restore() {
        let flow = approval_flow();
        let mut execution = Execution::new(&flow).with_scope("desk-1");
        execution.advance(1, flow.step_for(1).unwrap()).unwrap();

        let record = ExecutionRecord::capture(&execution, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(record.execution_state, ExecutionState::Running);
        assert!(record.progress.contains("isCompleted"));

        let restored = record.restore(DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(restored, execution);
        assert_eq!(restored.state().unwrap().name, "Review");
    }
}
