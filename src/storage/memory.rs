//! In-memory repositories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ExecutionQuery, ExecutionRepository, FlowQuery, FlowRepository};
use crate::error::StorageError;
use crate::execution::ExecutionRecord;
use crate::flow::Flow;

/// Flows in save order. Several flows may share a key; saving a flow with
/// an existing id replaces it and moves it to the end.
#[derive(Default)]
pub struct InMemoryFlowRepository {
    flows: RwLock<Vec<Arc<Flow>>>,
}

impl InMemoryFlowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowRepository for InMemoryFlowRepository {
    async fn get(&self, query: FlowQuery) -> Result<Vec<Arc<Flow>>, StorageError> {
        let flows = self.flows.read().await;
        Ok(flows
            .iter()
            .filter(|flow| query.matches(flow))
            .cloned()
            .collect())
    }

    async fn save(&self, flow: Arc<Flow>) -> Result<Uuid, StorageError> {
        let id = flow.id();
        let mut flows = self.flows.write().await;
        let before = flows.len();
        flows.retain(|stored| stored.id() != id);
        if flows.len() < before {
            debug!("Replaced flow definition {}", id);
        }
        flows.push(flow);
        Ok(id)
    }
}

/// Execution records keyed by id.
#[derive(Default)]
pub struct InMemoryExecutionRepository {
    records: RwLock<HashMap<Uuid, ExecutionRecord>>,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn get(&self, query: ExecutionQuery) -> Result<Vec<ExecutionRecord>, StorageError> {
        let records = self.records.read().await;
        let mut matched: Vec<ExecutionRecord> = records
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        matched.sort_by_key(|record| record.created_on);
        Ok(matched)
    }

    async fn save(&self, record: ExecutionRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records.insert(record.id, record);
        Ok(())
    }
}
