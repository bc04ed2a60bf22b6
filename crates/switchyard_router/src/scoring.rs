//! Candidate scoring shared by every routing strategy.

use crate::registry::CapabilityProfile;
use crate::tracker::WorkerStats;
use serde::{Deserialize, Serialize};
use switchyard_core::{Complexity, RequirementProfile};

/// Points per overlapping capability tag
pub const CAPABILITY_POINTS: f64 = 20.0;
/// Points for an exact complexity match
pub const EXACT_COMPLEXITY_POINTS: f64 = 15.0;
/// Points for a high complexity worker serving a medium requirement
pub const STRETCH_COMPLEXITY_POINTS: f64 = 10.0;
/// Points per compatible channel tag
pub const CHANNEL_POINTS: f64 = 5.0;
/// Floor of the load multiplier; load penalizes but never excludes
pub const MIN_LOAD_FACTOR: f64 = 0.1;

/// Score a worker type for a requirement profile
///
/// Returns zero when the worker type shares no capability with the
/// requirements.
#[must_use]
pub fn score_candidate(
    profile: &CapabilityProfile,
    requirements: &RequirementProfile,
    stats: &WorkerStats,
) -> f64 {
    let overlap = profile.capabilities.overlap(&requirements.capabilities);
    if overlap == 0 {
        return 0.0;
    }

    let mut base = CAPABILITY_POINTS * overlap as f64;
    if profile.complexity == requirements.complexity {
        base += EXACT_COMPLEXITY_POINTS;
    } else if profile.complexity == Complexity::High && requirements.complexity == Complexity::Medium
    {
        base += STRETCH_COMPLEXITY_POINTS;
    }
    let channels = profile.channels.intersection(&requirements.channels).count();
    base += CHANNEL_POINTS * channels as f64;

    let load_factor = (1.0 - stats.load.load_ratio(profile.concurrency_limit)).max(MIN_LOAD_FACTOR);
    base * stats.performance.success_rate * stats.load.efficiency * load_factor
}

/// A scored worker type, as recorded in a routing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Worker type
    pub worker_type: String,
    /// Shared candidate score
    pub score: f64,
    /// Strategy specific selection value
    pub selection_score: f64,
    /// Active tasks over the concurrency limit
    pub load_ratio: f64,
    /// Success rate at decision time
    pub success_rate: f64,
    /// Average response time at decision time
    pub average_response_ms: f64,
    /// Nominal duration in milliseconds
    pub nominal_ms: f64,
    /// Whether a specialization matched the requirements
    pub specialized: bool,
}

impl CandidateScore {
    /// Evaluate a worker type against requirements
    #[must_use]
    pub fn evaluate(
        profile: &CapabilityProfile,
        requirements: &RequirementProfile,
        stats: &WorkerStats,
    ) -> Self {
        let score = score_candidate(profile, requirements, stats);
        Self {
            worker_type: profile.worker_type.clone(),
            score,
            selection_score: score,
            load_ratio: stats.load.load_ratio(profile.concurrency_limit),
            success_rate: stats.performance.success_rate,
            average_response_ms: if stats.performance.has_history() {
                stats.performance.average_response_ms
            } else {
                0.0
            },
            nominal_ms: profile.nominal_duration.as_secs_f64() * 1000.0,
            specialized: profile.specializations.intersects(&requirements.capabilities),
        }
    }

    /// Only candidates with a positive score can be selected
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.score > 0.0
    }
}
