//! Uploaded Activity Modules
//!
//! Activities supplied at runtime. How a module is compiled is outside the
//! engine: the uploader hands over the module bytes together with the
//! activity factories the module exports, and the store answers name
//! lookups against those exports.

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::registry::{ActivityFactory, ActivityRegistry};
use crate::error::StorageError;

/// An uploaded code module.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActivityModule {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl ActivityModule {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Storage for uploaded activity modules.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Stores a module and the activities it exports. Re-uploading a file
    /// name replaces the previous module.
    async fn save(&self, module: ActivityModule, exports: ActivityRegistry) -> Result<(), StorageError>;

    /// Lists stored modules.
    async fn modules(&self) -> Result<Vec<ActivityModule>, StorageError>;

    /// Finds the factory for an exported activity.
    async fn find_activity(&self, name: &str) -> Result<Option<ActivityFactory>, StorageError>;
}

struct StoredModule {
    module: ActivityModule,
    exports: ActivityRegistry,
}

/// Keeps uploaded modules in memory.
#[derive(Default)]
pub struct InMemoryModuleStore {
    modules: RwLock<Vec<StoredModule>>,
}

impl InMemoryModuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    async fn save(&self, module: ActivityModule, exports: ActivityRegistry) -> Result<(), StorageError> {
        let mut modules = self.modules.write().await;
        modules.retain(|m| m.module.file_name != module.file_name);

        info!(
            "Stored activity module '{}' ({} bytes, exports: {:?})",
            module.file_name,
            module.len(),
            exports.names()
        );

        modules.push(StoredModule { module, exports });
        Ok(())
    }

    async fn modules(&self) -> Result<Vec<ActivityModule>, StorageError> {
        let modules = self.modules.read().await;
        Ok(modules.iter().map(|m| m.module.clone()).collect())
    }

    async fn find_activity(&self, name: &str) -> Result<Option<ActivityFactory>, StorageError> {
        let modules = self.modules.read().await;

        // Latest upload wins when two modules export the same name
        Ok(modules
            .iter()
            .rev()
            .find_map(|m| m.exports.factory(name)))
    }
}
