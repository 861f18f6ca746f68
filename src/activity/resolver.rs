//! Activity Resolution
//!
//! Maps an activity name to an instance. Search order:
//! 1. Statically registered activities
//! 2. Activities exported by uploaded modules
//!
//! Failures never escape as panics or storage errors; they are reported as
//! [`ResolutionError::NotFound`] or [`ResolutionError::Instantiation`].

use std::sync::Arc;

use log::{debug, warn};

use super::module::ModuleStore;
use super::registry::{run_factory, ActivityRegistry};
use super::Activity;
use crate::error::ResolutionError;

pub struct ActivityResolver {
    registry: ActivityRegistry,
    modules: Option<Arc<dyn ModuleStore>>,
}

impl ActivityResolver {
    pub fn new(registry: ActivityRegistry) -> Self {
        Self {
            registry,
            modules: None,
        }
    }

    /// Also searches `store` when the registry has no match.
    pub fn with_module_store(mut self, store: Arc<dyn ModuleStore>) -> Self {
        self.modules = Some(store);
        self
    }

    pub fn registry(&self) -> &ActivityRegistry {
        &self.registry
    }

    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn Activity>, ResolutionError> {
        let name = name.trim();

        if let Some(result) = self.registry.instantiate(name) {
            debug!("Activity '{}' resolved from registry", name);
            return result;
        }

        let Some(store) = &self.modules else {
            return Err(ResolutionError::NotFound(name.to_string()));
        };

        match store.find_activity(name).await {
            Ok(Some(factory)) => {
                debug!("Activity '{}' resolved from module store", name);
                run_factory(name, &factory)
            }
            Ok(None) => Err(ResolutionError::NotFound(name.to_string())),
            Err(e) => {
                warn!("Module store lookup for '{}' failed: {}", name, e);
                Err(ResolutionError::NotFound(name.to_string()))
            }
        }
    }
}

impl Default for ActivityResolver {
    fn default() -> Self {
        Self::new(ActivityRegistry::with_builtins())
    }
}
