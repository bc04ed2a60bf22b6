//! Bounded audit history of routing decisions.
//!
//! Entries are evicted once the history exceeds its capacity or once they
//! are older than the retention period, whichever comes first.

use crate::decision::RoutingDecision;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::TaskId;
use switchyard_core::time::{age, duration_ms};

/// Audit retention bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum retained decisions
    pub max_entries: usize,
    /// Maximum age of a retained decision
    #[serde(rename = "retention_ms", with = "duration_ms")]
    pub retention: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            retention: Duration::from_secs(3600),
        }
    }
}

impl AuditConfig {
    /// Set maximum entries
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set retention period
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Decision history, oldest first
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: VecDeque<Arc<RoutingDecision>>,
    config: AuditConfig,
}

impl AuditLog {
    /// Create an empty history
    #[must_use]
    pub fn new(config: AuditConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            config,
        }
    }

    /// Append a decision and return the decisions evicted to make room
    pub fn record(&mut self, decision: Arc<RoutingDecision>) -> Vec<Arc<RoutingDecision>> {
        self.entries.push_back(decision);
        let mut evicted = self.prune();
        while self.entries.len() > self.config.max_entries {
            if let Some(oldest) = self.entries.pop_front() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Drop decisions older than the retention period
    pub fn prune(&mut self) -> Vec<Arc<RoutingDecision>> {
        let mut evicted = Vec::new();
        while self
            .entries
            .front()
            .is_some_and(|d| age(d.timestamp) > self.config.retention)
        {
            if let Some(expired) = self.entries.pop_front() {
                evicted.push(expired);
            }
        }
        evicted
    }

    /// Latest decision for a task
    #[must_use]
    pub fn find(&self, task_id: &TaskId) -> Option<Arc<RoutingDecision>> {
        self.entries
            .iter()
            .rev()
            .find(|d| &d.task_id == task_id)
            .cloned()
    }

    /// Check if any retained decision belongs to a task
    #[must_use]
    pub fn contains_task(&self, task_id: &TaskId) -> bool {
        self.entries.iter().any(|d| &d.task_id == task_id)
    }

    /// Retained decisions, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<Arc<RoutingDecision>> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained decisions
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::RoutingStrategy;
    use switchyard_core::{DecisionId, Priority, RequirementProfile, now};

    fn decision(task: &str, age_secs: i64) -> Arc<RoutingDecision> {
        Arc::new(RoutingDecision {
            id: DecisionId::new(),
            task_id: TaskId::new(task).unwrap(),
            selected_worker: "tester".to_string(),
            candidates: Vec::new(),
            requirements: RequirementProfile::default(),
            strategy: RoutingStrategy::Simple,
            priority: Priority::Medium,
            timeout_ms: 300_000,
            routing_latency_us: 12,
            timestamp: now() - chrono::Duration::seconds(age_secs),
        })
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut log = AuditLog::new(AuditConfig::default().with_max_entries(2));
        assert!(log.record(decision("t-1", 0)).is_empty());
        assert!(log.record(decision("t-2", 0)).is_empty());
        let evicted = log.record(decision("t-3", 0));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].task_id.as_str(), "t-1");
        assert_eq!(log.len(), 2);
        assert!(!log.contains_task(&TaskId::new("t-1").unwrap()));
    }

    #[test]
    fn test_retention_evicts_expired() {
        let mut log = AuditLog::new(AuditConfig::default().with_retention(Duration::from_secs(60)));
        log.record(decision("old", 120));
        let evicted = log.record(decision("fresh", 0));
        assert_eq!(evicted.len(), 1);
        assert_eq!(log.len(), 1);
        assert!(log.find(&TaskId::new("fresh").unwrap()).is_some());
    }

    #[test]
    fn test_find_returns_latest() {
        let mut log = AuditLog::new(AuditConfig::default());
        let first = decision("t-1", 0);
        let second = decision("t-1", 0);
        log.record(first);
        log.record(Arc::clone(&second));
        assert_eq!(log.find(&TaskId::new("t-1").unwrap()).unwrap().id, second.id);
    }

    #[test]
    fn test_config_defaults() {
        let config: AuditConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.retention, Duration::from_secs(3600));
    }
}
