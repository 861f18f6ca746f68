//! FlowRunner - Programmable Workflow Engine
//!
//! Models multi-step business processes as state graphs. A flow is built
//! once, then any number of executions move through it as callers fire
//! trigger codes. Each fire passes an ordered handler pipeline
//! (authorization, activities, transition validation, persistence) and
//! either commits exactly one step or changes nothing.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`flow`]: Flow definitions, the builder DSL and the JSON format
//! - [`activity`]: Step hooks and the resolver that finds them by name
//! - [`execution`]: Execution model, handler pipeline and operator
//! - [`storage`]: Flow and execution repositories
//! - [`config`]: Engine configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowrunner::activity::ActivityResolver;
//! use flowrunner::config::EngineConfig;
//! use flowrunner::execution::FlowOperator;
//! use flowrunner::flow::{FlowBuilder, State};
//! use flowrunner::storage::{InMemoryExecutionRepository, InMemoryFlowRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let draft = State::new(0, "Draft");
//!     let review = State::new(1, "Review");
//!     let approved = State::new(2, "Approved");
//!
//!     let flow = FlowBuilder::new("approval")
//!         .state(approved.clone())
//!         .initial(|s| s.for_state(draft).allow(review.clone(), 1))
//!         .new_step(|s| s.for_state(review).allow_when(approved, 2, || true).on_entry_named("log"))
//!         .build()?;
//!
//!     let operator = FlowOperator::new(
//!         Arc::new(InMemoryFlowRepository::new()),
//!         Arc::new(InMemoryExecutionRepository::new()),
//!         Arc::new(ActivityResolver::default()),
//!         &EngineConfig::default(),
//!     );
//!
//!     let execution = operator.instantiate(&flow).await?;
//!     operator.fire(execution.id, 1, None).await;
//!     let result = operator.fire(execution.id, 2, None).await;
//!     println!("{}", result.message);
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod config;
pub mod error;
pub mod execution;
pub mod flow;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use activity::{Activity, ActivityContext, ActivityResolver};
pub use config::EngineConfig;
pub use error::{DefinitionError, FlowError};
pub use execution::{Execution, FireResult, FlowOperator, StepData};
pub use flow::{load_flow, Flow, FlowBuilder, State};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FlowRunner";

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_module_exports_builder() {
        let flow = FlowBuilder::new("export")
            .state(State::new(1, "Done"))
            .initial(|s| s.for_state(State::new(0, "Start")).allow(State::new(1, "Done"), 1))
            .build()
            .unwrap();
        assert_eq!(flow.key(), "export");
    }

    #[tokio::test]
    async fn test_root_exports_run_a_flow() {
        let flow = FlowBuilder::new("export")
            .state(State::new(1, "Done"))
            .initial(|s| s.for_state(State::new(0, "Start")).allow(State::new(1, "Done"), 1))
            .build()
            .unwrap();

        let operator = FlowOperator::new(
            Arc::new(storage::InMemoryFlowRepository::new()),
            Arc::new(storage::InMemoryExecutionRepository::new()),
            Arc::new(ActivityResolver::default()),
            &EngineConfig::default(),
        );
        let execution: Execution = operator.instantiate(&flow).await.unwrap();

        let result: FireResult = operator.fire(execution.id, 1, Some(StepData::new())).await;
        assert!(result.is_completed(), "{}", result.message);
        assert_eq!(result.state.unwrap().name, "Done");
    }

    #[tokio::test]
    async fn test_default_resolver_has_builtins() {
        let resolver = ActivityResolver::default();
        let activity: Arc<dyn Activity> = resolver.resolve("log").await.unwrap();
        assert_eq!(activity.name(), "log");
    }

    #[test]
    fn test_error_exports() {
        let err: FlowError = DefinitionError::MissingState.into();
        assert_eq!(err.kind(), error::ErrorKind::Definition);
    }
}
