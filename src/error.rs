//! Error Types
//!
//! Error taxonomy shared by the builder, the activity resolver, the
//! storage layer and the execution pipeline.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::execution::ExecutionState;

/// Raised synchronously while building a flow. No partial flow is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Flow '{0}' has no initial step")]
    MissingInitial(String),

    #[error("A step was declared without a state")]
    MissingState,

    #[error("State code {code} is declared twice ('{first}' and '{second}')")]
    DuplicateStateCode {
        code: i32,
        first: String,
        second: String,
    },

    #[error("State {0} has more than one step")]
    DuplicateStep(i32),

    #[error("Step for state {from} allows undefined target state {target}")]
    UndefinedTarget { from: i32, target: i32 },

    #[error("Step for state {state} uses trigger {trigger} more than once")]
    DuplicateTrigger { state: i32, trigger: i32 },

    #[error("Initial step for state {0} has no allowed transitions")]
    TerminalInitial(i32),

    #[error("Flow document references unknown state code {0}")]
    UnknownStateCode(i32),

    #[error("Activity '{name}' could not be resolved: {reason}")]
    UnresolvedActivity { name: String, reason: String },

    #[error("Malformed flow document: {0}")]
    Malformed(String),

    #[error("Flow document I/O failed for '{path}': {reason}")]
    Io { path: String, reason: String },
}

/// Activity lookup failures. Never propagated out of a build in lenient mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Activity '{0}' not found")]
    NotFound(String),

    #[error("Activity '{name}' could not be instantiated: {reason}")]
    Instantiation { name: String, reason: String },
}

impl ResolutionError {
    /// Name of the activity that failed to resolve.
    pub fn name(&self) -> &str {
        match self {
            Self::NotFound(name) => name,
            Self::Instantiation { name, .. } => name,
        }
    }
}

/// Failure reported by an activity's `invoke` or `compensate`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ActivityError(pub String);

impl ActivityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for ActivityError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ActivityError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Errors from repositories and progress serialization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Progress nesting depth {depth} exceeds limit {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Errors raised while operating on executions.
///
/// Inside a fire these never reach the caller: the pipeline converts them
/// into a failed [`FireResult`](crate::execution::FireResult).
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("No active steps to fire for execution {0}")]
    NoActiveStep(Uuid),

    #[error("Action {action} is invalid for state '{state}'")]
    InvalidAction { action: i32, state: String },

    #[error("Transition '{from}' -> '{to}' is not yet completed")]
    NotYetCompleted { from: String, to: String },

    #[error("Transition condition not met for '{from}' -> '{to}'")]
    ConditionNotMet { from: String, to: String },

    #[error("Execution {0} is suspended")]
    Suspended(Uuid),

    #[error("Execution {id} cannot move from {from:?} to {to:?}")]
    IllegalState {
        id: Uuid,
        from: ExecutionState,
        to: ExecutionState,
    },

    #[error("Actor '{actor}' is not authorized: {reason}")]
    Unauthorized { actor: String, reason: String },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Activity '{name}' failed: {source}")]
    Activity {
        name: String,
        #[source]
        source: ActivityError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("Execution fault: {0}")]
    Fault(String),
}

/// Coarse classification of a [`FlowError`], carried by failed fire results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NoActiveStep,
    InvalidAction,
    NotYetCompleted,
    ConditionNotMet,
    Suspended,
    IllegalState,
    Unauthorized,
    Resolution,
    Activity,
    Storage,
    Definition,
    Fault,
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoActiveStep(_) => ErrorKind::NoActiveStep,
            Self::InvalidAction { .. } => ErrorKind::InvalidAction,
            Self::NotYetCompleted { .. } => ErrorKind::NotYetCompleted,
            Self::ConditionNotMet { .. } => ErrorKind::ConditionNotMet,
            Self::Suspended(_) => ErrorKind::Suspended,
            Self::IllegalState { .. } => ErrorKind::IllegalState,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::Activity { .. } => ErrorKind::Activity,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Definition(_) => ErrorKind::Definition,
            Self::Fault(_) => ErrorKind::Fault,
        }
    }
}

/// Errors loading the engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
