//! Storage Module
//!
//! Repository contracts for flow definitions and execution records, with
//! in-memory and file-backed implementations.
//!
//! # Structure
//!
//! - [`memory`]: `RwLock`-guarded in-memory repositories
//! - [`file`]: One JSON file per execution record

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::execution::ExecutionRecord;
use crate::flow::Flow;

pub use file::FileExecutionRepository;
pub use memory::{InMemoryExecutionRepository, InMemoryFlowRepository};

/// Flow lookup filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowQuery {
    pub key: Option<String>,
    pub id: Option<Uuid>,
}

impl FlowQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            id: None,
        }
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            key: None,
            id: Some(id),
        }
    }

    pub fn matches(&self, flow: &Flow) -> bool {
        self.key.as_deref().map_or(true, |key| flow.key() == key)
            && self.id.map_or(true, |id| flow.id() == id)
    }
}

/// Execution lookup filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionQuery {
    pub id: Option<Uuid>,
    pub flow_id: Option<Uuid>,
    pub scope: Option<String>,
}

impl ExecutionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_flow(flow_id: Uuid) -> Self {
        Self {
            flow_id: Some(flow_id),
            ..Self::default()
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        self.id.map_or(true, |id| record.id == id)
            && self.flow_id.map_or(true, |id| record.flow_id == id)
            && self
                .scope
                .as_deref()
                .map_or(true, |scope| record.scope.as_deref() == Some(scope))
    }
}

/// Stores flow definitions.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// Matching flows, oldest save first.
    async fn get(&self, query: FlowQuery) -> Result<Vec<Arc<Flow>>, StorageError>;

    /// Stores a flow and returns its id.
    async fn save(&self, flow: Arc<Flow>) -> Result<Uuid, StorageError>;
}

/// Stores execution records.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn get(&self, query: ExecutionQuery) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// Inserts or replaces the record with the same id.
    async fn save(&self, record: ExecutionRecord) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Execution, DEFAULT_MAX_DEPTH};
    use crate::testing::approval_flow;

    #[test]
    fn test_flow_query_matches() {
        let flow = approval_flow();

        assert!(FlowQuery::all().matches(&flow));
        assert!(FlowQuery::by_key("approval").matches(&flow));
        assert!(FlowQuery::by_id(flow.id()).matches(&flow));
        assert!(!FlowQuery::by_key("billing").matches(&flow));
    }

    #[test]
    fn test_execution_query_matches() {
        let flow = approval_flow();
        let execution = Execution::new(&flow).with_scope("desk-1");
        let record = ExecutionRecord::capture(&execution, DEFAULT_MAX_DEPTH).unwrap();

        assert!(ExecutionQuery::all().matches(&record));
        assert!(ExecutionQuery::by_id(execution.id).matches(&record));
        assert!(ExecutionQuery::by_flow(flow.id()).with_scope("desk-1").matches(&record));
        assert!(!ExecutionQuery::by_flow(flow.id()).with_scope("desk-2").matches(&record));
        assert!(!ExecutionQuery::by_id(Uuid::new_v4()).matches(&record));
    }
}
