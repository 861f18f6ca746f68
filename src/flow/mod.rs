//! Flow Definition Module
//!
//! Data structures and tooling for defining flows: the states a process
//! moves through, the transitions between them and the activities run on
//! the way.
//!
//! # Structure
//!
//! - [`model`]: Core definition types (State, Transition, Step, Flow)
//! - [`builder`]: In-code definition DSL
//! - [`validator`]: Graph integrity checks
//! - [`serialized`]: JSON document format, loading and saving

pub mod builder;
pub mod model;
pub mod serialized;
pub mod validator;

pub use builder::{FlowBuilder, StepBuilder};
pub use model::{ActivityRef, Condition, Flow, State, Step, Transition};
pub use serialized::{load_flow, save_flow, SerializedFlow};
