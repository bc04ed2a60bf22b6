//! Router errors.

use crate::router::TaskState;
use switchyard_core::{CapabilitySet, CoreError};

/// Errors raised by the task router
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouterError {
    /// Task is malformed or already has a live decision; never retried
    #[error("Invalid task {task_id}: {reason}")]
    InvalidTask {
        /// Offending task id (possibly blank)
        task_id: String,
        /// What is wrong with it
        reason: String,
    },

    /// No worker type shares a capability with the task
    #[error("No suitable worker for task {task_id} requiring {capabilities}")]
    NoSuitableWorker {
        /// Routed task id
        task_id: String,
        /// Required capabilities
        capabilities: CapabilitySet,
    },

    /// Task id has no routing record
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Lifecycle call does not fit the task's current state
    #[error("Task {task_id} cannot move from {state}")]
    InvalidTransition {
        /// Task id
        task_id: String,
        /// Current state
        state: TaskState,
    },

    /// Shared validation failure
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RouterError {
    pub(crate) fn invalid_task(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTask {
            task_id: task_id.into(),
            reason: reason.into(),
        }
    }
}
