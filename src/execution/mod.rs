//! Flow Execution Module
//!
//! Runs flows: the per-execution progress model, its persisted form, and
//! the handler pipeline every fire passes through.
//!
//! # Architecture
//!
//! - [`model`]: Executions, their steps and lifecycle
//! - [`progress`]: Depth-bounded progress JSON and the persisted record
//! - [`context`]: Per-fire context, caller data and results
//! - [`pipeline`]: Ordered fire handlers with rollback
//! - [`operator`]: Instantiate, fire and query executions

pub mod context;
pub mod model;
pub mod operator;
pub mod pipeline;
pub mod progress;

pub use context::{Actor, FireResult, ResultStatus, StepContext, StepData};
pub use model::{Execution, ExecutionState, ExecutionStep, ExecutionStepDetail};
pub use operator::FlowOperator;
pub use pipeline::{Authorizer, Pipeline, Stage, StepHandler};
pub use progress::{ExecutionRecord, DEFAULT_MAX_DEPTH, MIN_PROGRESS_DEPTH};
