//! Workflow errors.

use crate::instance::{WorkflowInstance, WorkflowStatus};
use switchyard_core::{CoreError, WorkflowId};
use switchyard_router::RouterError;

/// Errors raised by the workflow coordinator and orchestrator
///
/// Errors raised while a workflow runs carry the instance state at the time
/// of failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// No template with this name
    #[error("Unknown workflow template: {0}")]
    UnknownTemplate(String),

    /// Template is malformed
    #[error("Invalid workflow template {template}: {reason}")]
    InvalidTemplate {
        /// Template name
        template: String,
        /// What is wrong with it
        reason: String,
    },

    /// Phase dependencies form a cycle
    #[error("Workflow template {template} has a dependency cycle: {}", cycle.join(" -> "))]
    CyclicWorkflow {
        /// Template name
        template: String,
        /// Phases on the cycle, first phase repeated at the end
        cycle: Vec<String>,
    },

    /// A quality gate failed in strict mode
    #[error("Quality gate failed for phase {phase}")]
    QualityGate {
        /// Phase whose gate failed
        phase: String,
        /// Instance state when the workflow aborted
        instance: Box<WorkflowInstance>,
    },

    /// A phase failed in strict mode
    #[error("Phase {phase} failed")]
    PhaseFailed {
        /// Failed phase
        phase: String,
        /// Instance state when the workflow aborted
        instance: Box<WorkflowInstance>,
    },

    /// The workflow was abandoned while running
    #[error("Workflow {} was abandoned", instance.id)]
    Abandoned {
        /// Instance state when the abandonment was observed
        instance: Box<WorkflowInstance>,
    },

    /// No workflow with this id
    #[error("Workflow not found: {0}")]
    NotFound(WorkflowId),

    /// Operation does not fit the workflow's status
    #[error("Workflow {id} is {status}")]
    InvalidState {
        /// Workflow id
        id: WorkflowId,
        /// Current status
        status: WorkflowStatus,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task routing failed
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Shared validation failure
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl WorkflowError {
    /// Instance state attached to an execution error
    #[must_use]
    pub fn instance(&self) -> Option<&WorkflowInstance> {
        match self {
            Self::QualityGate { instance, .. }
            | Self::PhaseFailed { instance, .. }
            | Self::Abandoned { instance } => Some(instance),
            _ => None,
        }
    }
}
