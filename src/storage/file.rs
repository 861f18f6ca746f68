//! File-backed Execution Repository
//!
//! Each execution record is written to `{dir}/{id}.json` after every
//! commit, so an execution's active step survives a restart.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::fs;
use uuid::Uuid;

use super::{ExecutionQuery, ExecutionRepository};
use crate::error::StorageError;
use crate::execution::ExecutionRecord;

/// Default state directory, relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = ".flowrunner";

#[derive(Debug, Clone)]
pub struct FileExecutionRepository {
    dir: PathBuf,
}

impl FileExecutionRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_record(path: &Path) -> Result<ExecutionRecord, StorageError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl ExecutionRepository for FileExecutionRepository {
    async fn get(&self, query: ExecutionQuery) -> Result<Vec<ExecutionRecord>, StorageError> {
        if !fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        // Direct lookup when the id is known
        if let Some(id) = query.id {
            let path = self.record_path(id);
            if !fs::try_exists(&path).await? {
                return Ok(Vec::new());
            }
            let record = Self::read_record(&path).await?;
            return Ok(if query.matches(&record) { vec![record] } else { Vec::new() });
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(record) if query.matches(&record) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        records.sort_by_key(|record| record.created_on);
        debug!("Loaded {} execution records from {}", records.len(), self.dir.display());
        Ok(records)
    }

    async fn save(&self, record: ExecutionRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.record_path(record.id);
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&path, json).await?;

        info!("Saved execution {} to {}", record.id, path.display());
        Ok(())
    }
}
