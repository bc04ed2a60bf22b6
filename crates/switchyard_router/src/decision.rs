//! Routing decisions.

use crate::scoring::CandidateScore;
use crate::strategy::RoutingStrategy;
use serde::{Deserialize, Serialize};
use switchyard_core::{DecisionId, Priority, RequirementProfile, TaskId, Timestamp};

/// Immutable record of how a task was routed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Decision id
    pub id: DecisionId,
    /// Routed task
    pub task_id: TaskId,
    /// Chosen worker type
    pub selected_worker: String,
    /// Every evaluated worker type with its scores
    pub candidates: Vec<CandidateScore>,
    /// Requirements at decision time
    pub requirements: RequirementProfile,
    /// Strategy used
    pub strategy: RoutingStrategy,
    /// Resolved priority
    pub priority: Priority,
    /// Resolved timeout in milliseconds
    pub timeout_ms: u64,
    /// Time spent deciding, in microseconds
    pub routing_latency_us: u64,
    /// Decision time
    pub timestamp: Timestamp,
}

impl RoutingDecision {
    /// Score entry of the selected worker
    #[must_use]
    pub fn selected(&self) -> Option<&CandidateScore> {
        self.candidates
            .iter()
            .find(|c| c.worker_type == self.selected_worker)
    }

    /// Resolved timeout
    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}
