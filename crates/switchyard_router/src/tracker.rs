//! Load and performance tracking per worker type.
//!
//! The tracker is plain data; the router owns it behind its state lock so
//! every update is applied in one critical section.

use crate::registry::CapabilityRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_core::{CoreError, CoreResult, TaskFailure};

/// Lower bound of the efficiency multiplier
pub const MIN_EFFICIENCY: f64 = 0.1;
/// Upper bound of the efficiency multiplier
pub const MAX_EFFICIENCY: f64 = 2.0;

/// Load counters of a worker type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerLoadState {
    /// Tasks currently executing
    pub active: u32,
    /// Tasks routed but not yet started
    pub queued: u32,
    /// Tasks completed successfully
    pub completed: u64,
    /// Average completion time of successful tasks in milliseconds
    pub average_completion_ms: f64,
    /// Efficiency multiplier in `[0.1, 2.0]`
    pub efficiency: f64,
}

impl Default for WorkerLoadState {
    fn default() -> Self {
        Self {
            active: 0,
            queued: 0,
            completed: 0,
            average_completion_ms: 0.0,
            efficiency: 1.0,
        }
    }
}

impl WorkerLoadState {
    /// Ratio of active tasks to the concurrency limit
    #[must_use]
    pub fn load_ratio(&self, concurrency_limit: u32) -> f64 {
        f64::from(self.active) / f64::from(concurrency_limit.max(1))
    }
}

/// Historical performance of a worker type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPerformanceState {
    /// Successful share of finished tasks
    pub success_rate: f64,
    /// Average response time in milliseconds
    pub average_response_ms: f64,
    /// Finished tasks
    pub total_tasks: u64,
    /// Failed tasks
    pub failed_tasks: u64,
    /// Failed tasks that timed out
    pub timeout_count: u64,
}

impl Default for WorkerPerformanceState {
    fn default() -> Self {
        Self {
            success_rate: 1.0,
            average_response_ms: 0.0,
            total_tasks: 0,
            failed_tasks: 0,
            timeout_count: 0,
        }
    }
}

impl WorkerPerformanceState {
    /// Check if any task has finished
    #[must_use]
    pub fn has_history(&self) -> bool {
        self.total_tasks > 0
    }
}

/// Combined state of one worker type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Load counters
    pub load: WorkerLoadState,
    /// Performance history
    pub performance: WorkerPerformanceState,
}

#[derive(Debug, Clone)]
struct Entry {
    stats: WorkerStats,
    nominal: Duration,
}

/// Mutable counters for every registered worker type
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    entries: IndexMap<String, Entry>,
}

impl Tracker {
    /// Create a tracker with a zeroed entry per registered worker type
    #[must_use]
    pub fn new(registry: &CapabilityRegistry) -> Self {
        let entries = registry
            .iter()
            .map(|profile| {
                (
                    profile.worker_type.clone(),
                    Entry {
                        stats: WorkerStats::default(),
                        nominal: profile.nominal_duration,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    fn entry_mut(&mut self, worker_type: &str) -> CoreResult<&mut Entry> {
        self.entries
            .get_mut(worker_type)
            .ok_or_else(|| CoreError::not_found("Worker", worker_type))
    }

    /// Get the state of a worker type
    #[must_use]
    pub fn stats(&self, worker_type: &str) -> Option<&WorkerStats> {
        self.entries.get(worker_type).map(|e| &e.stats)
    }

    /// Get load counters of a worker type
    #[must_use]
    pub fn load(&self, worker_type: &str) -> Option<&WorkerLoadState> {
        self.stats(worker_type).map(|s| &s.load)
    }

    /// Get performance history of a worker type
    #[must_use]
    pub fn performance(&self, worker_type: &str) -> Option<&WorkerPerformanceState> {
        self.stats(worker_type).map(|s| &s.performance)
    }

    /// Record a task routed to a worker type
    ///
    /// # Errors
    ///
    /// Returns error if the worker type is unknown
    pub fn record_queued(&mut self, worker_type: &str) -> CoreResult<()> {
        self.entry_mut(worker_type)?.stats.load.queued += 1;
        Ok(())
    }

    /// Record a queued task starting execution
    ///
    /// # Errors
    ///
    /// Returns error if the worker type is unknown
    pub fn record_started(&mut self, worker_type: &str) -> CoreResult<()> {
        let load = &mut self.entry_mut(worker_type)?.stats.load;
        load.queued = load.queued.saturating_sub(1);
        load.active += 1;
        Ok(())
    }

    /// Record a finished task and refresh the performance statistics
    ///
    /// # Errors
    ///
    /// Returns error if the worker type is unknown
    pub fn update_performance(
        &mut self,
        worker_type: &str,
        success: bool,
        response_time_ms: u64,
        error: Option<&TaskFailure>,
    ) -> CoreResult<()> {
        let entry = self.entry_mut(worker_type)?;
        let nominal_ms = entry.nominal.as_secs_f64() * 1000.0;
        let response = response_time_ms as f64;

        let perf = &mut entry.stats.performance;
        perf.total_tasks += 1;
        if !success {
            perf.failed_tasks += 1;
            if error.is_some_and(TaskFailure::is_timeout) {
                perf.timeout_count += 1;
            }
        }
        perf.success_rate = (perf.total_tasks - perf.failed_tasks) as f64 / perf.total_tasks as f64;
        perf.average_response_ms += (response - perf.average_response_ms) / perf.total_tasks as f64;

        let load = &mut entry.stats.load;
        load.active = load.active.saturating_sub(1);
        load.efficiency = if perf.average_response_ms > 0.0 {
            (nominal_ms / perf.average_response_ms).clamp(MIN_EFFICIENCY, MAX_EFFICIENCY)
        } else {
            MAX_EFFICIENCY
        };
        if success {
            load.completed += 1;
            load.average_completion_ms +=
                (response - load.average_completion_ms) / load.completed as f64;
        }
        Ok(())
    }

    /// Snapshot of every worker type in registration order
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, WorkerStats> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.stats.clone()))
            .collect()
    }
}
