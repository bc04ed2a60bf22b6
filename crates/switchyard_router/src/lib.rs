//! SWITCHYARD Router
//!
//! Scores worker types against the derived requirements of a task and
//! selects one according to a configurable strategy. Load and performance
//! feedback from completed tasks flows back into later decisions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod decision;
pub mod error;
pub mod registry;
pub mod requirements;
pub mod router;
pub mod scoring;
pub mod strategy;
pub mod tracker;

pub use audit::{AuditConfig, AuditLog};
pub use decision::RoutingDecision;
pub use error::RouterError;
pub use registry::{CapabilityProfile, CapabilityRegistry};
pub use requirements::{RequirementRule, RequirementRules, infer_from_payload};
pub use router::{PriorityTimeouts, RouterConfig, RouterStatistics, TaskRouter, TaskState};
pub use scoring::{CandidateScore, score_candidate};
pub use strategy::RoutingStrategy;
pub use tracker::{Tracker, WorkerLoadState, WorkerPerformanceState, WorkerStats};
