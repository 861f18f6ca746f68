//! Static Activity Registry
//!
//! Name-keyed table of activity factories. Resolution instantiates a fresh
//! activity through its factory; a failing or panicking factory surfaces as
//! [`ResolutionError::Instantiation`].

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::debug;

use super::builtin::register_builtins;
use super::Activity;
use crate::error::{ActivityError, ResolutionError};

/// Constructs an activity instance.
pub type ActivityFactory =
    Arc<dyn Fn() -> Result<Arc<dyn Activity>, ActivityError> + Send + Sync>;

/// Read-only after construction, so it can be shared without locking.
#[derive(Clone, Default)]
pub struct ActivityRegistry {
    factories: HashMap<String, ActivityFactory>,
}

impl ActivityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in activities.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Registers an infallible factory.
    pub fn register<A, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        A: Activity + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.register_fallible(name, move || Ok(Arc::new(factory()) as Arc<dyn Activity>))
    }

    /// Registers a factory that may refuse to construct the activity.
    pub fn register_fallible<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Activity>, ActivityError> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering activity '{}'", name);
        self.factories.insert(name, Arc::new(factory));
        self
    }

    /// Registers a `Default`-constructible activity.
    pub fn register_default<A>(&mut self, name: impl Into<String>) -> &mut Self
    where
        A: Activity + Default + 'static,
    {
        self.register(name, A::default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Gets the factory registered under `name`.
    pub fn factory(&self, name: &str) -> Option<ActivityFactory> {
        self.factories.get(name).cloned()
    }

    /// Instantiates the activity registered under `name`.
    ///
    /// Returns `None` if the name is not registered.
    pub fn instantiate(&self, name: &str) -> Option<Result<Arc<dyn Activity>, ResolutionError>> {
        let factory = self.factories.get(name)?;
        Some(run_factory(name, factory))
    }
}

/// Runs a factory, turning errors and panics into instantiation failures.
pub(crate) fn run_factory(
    name: &str,
    factory: &ActivityFactory,
) -> Result<Arc<dyn Activity>, ResolutionError> {
    match catch_unwind(AssertUnwindSafe(|| factory())) {
        Ok(Ok(activity)) => Ok(activity),
        Ok(Err(e)) => Err(ResolutionError::Instantiation {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ResolutionError::Instantiation {
            name: name.to_string(),
            reason: "factory panicked".to_string(),
        }),
    }
}

impl fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("names", &self.names())
            .finish()
    }
}
