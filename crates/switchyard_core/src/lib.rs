//! SWITCHYARD Core Types
//!
//! Shared vocabulary for the router, backend manager and workflow coordinator.
//! This crate contains pure types and logic with no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capability;
pub mod error;
pub mod id;
pub mod task;
pub mod time;

// Re-exports
pub use capability::{Capability, CapabilitySet};
pub use error::{CoreError, CoreResult};
pub use id::{DecisionId, TaskId, WorkflowId};
pub use task::{
    Complexity, FailureKind, Priority, RequirementProfile, Task, TaskFailure, TaskOutcome,
};
pub use time::{Timestamp, elapsed_ms, now};
