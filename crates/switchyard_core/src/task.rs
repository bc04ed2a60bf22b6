//! Tasks, priorities and requirement profiles.

use crate::capability::CapabilitySet;
use crate::id::TaskId;
use crate::time::{Timestamp, duration_ms, now};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work
    Low,
    /// Normal work
    #[default]
    Medium,
    /// Time-sensitive work
    High,
    /// Must run now
    Critical,
}

impl Priority {
    /// High and critical tasks are urgent
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Default timeout when the task does not carry one
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        match self {
            Self::Critical => Duration::from_secs(60),
            Self::High => Duration::from_secs(120),
            Self::Medium => Duration::from_secs(300),
            Self::Low => Duration::from_secs(600),
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexity class of a task or worker type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Small, mechanical work
    Low,
    /// Typical work
    #[default]
    Medium,
    /// Multi-concern work
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Derived needs of a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementProfile {
    /// Capability tags the task needs
    pub capabilities: CapabilitySet,
    /// Complexity class
    pub complexity: Complexity,
    /// Estimated duration
    #[serde(rename = "estimated_duration_ms", with = "duration_ms")]
    pub estimated_duration: Duration,
    /// Channel tags the task needs
    #[serde(default)]
    pub channels: BTreeSet<String>,
}

impl RequirementProfile {
    /// Create a profile
    #[must_use]
    pub fn new(capabilities: CapabilitySet, complexity: Complexity, estimated: Duration) -> Self {
        Self {
            capabilities,
            complexity,
            estimated_duration: estimated,
            channels: BTreeSet::new(),
        }
    }

    /// Set required channel tags
    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }
}

/// A unit of work submitted by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Caller supplied id
    pub id: TaskId,
    /// Task type, matched against the requirement rules table
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Opaque payload
    #[serde(default)]
    pub payload: Option<Value>,
    /// Priority, medium when absent
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Timeout in milliseconds, derived from priority when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Creation time
    #[serde(default = "now")]
    pub created_at: Timestamp,
}

impl Task {
    /// Create a new task with a payload
    #[must_use]
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: TaskId::unchecked(id.into()),
            task_type: None,
            payload: Some(payload),
            priority: None,
            timeout_ms: None,
            created_at: now(),
        }
    }

    /// Set task type
    #[must_use]
    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    /// Set priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Check if the task has a usable payload
    #[must_use]
    pub fn has_payload(&self) -> bool {
        !matches!(self.payload, None | Some(Value::Null))
    }

    /// Effective priority
    #[must_use]
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }
}

/// Failure category reported back to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Exceeded its timeout
    Timeout,
    /// Worker or channel reported an error
    Execution,
    /// Work was discarded before completion
    Abandoned,
}

/// Failure details for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Human readable message
    pub message: String,
}

impl TaskFailure {
    /// Timeout failure
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }

    /// Execution failure
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Execution,
            message: message.into(),
        }
    }

    /// Check if this failure is a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Terminal outcome of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Whether the task succeeded
    pub success: bool,
    /// Observed response time in milliseconds
    pub response_time_ms: u64,
    /// Failure details when unsuccessful
    pub failure: Option<TaskFailure>,
}

impl TaskOutcome {
    /// Successful outcome
    #[must_use]
    pub fn succeeded(response_time_ms: u64) -> Self {
        Self {
            success: true,
            response_time_ms,
            failure: None,
        }
    }

    /// Failed outcome
    #[must_use]
    pub fn failed(response_time_ms: u64, failure: TaskFailure) -> Self {
        Self {
            success: false,
            response_time_ms,
            failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_default_and_urgency() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert!(Priority::Critical.is_urgent());
        assert!(Priority::High.is_urgent());
        assert!(!Priority::Medium.is_urgent());
        assert!(!Priority::Low.is_urgent());
    }

    #[test]
    fn test_priority_timeouts_ordered() {
        assert!(Priority::Critical.default_timeout() < Priority::High.default_timeout());
        assert!(Priority::High.default_timeout() < Priority::Medium.default_timeout());
        assert!(Priority::Medium.default_timeout() < Priority::Low.default_timeout());
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("t-1", json!({"description": "add endpoint"}))
            .with_type("api-development")
            .with_priority(Priority::High)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(task.id.as_str(), "t-1");
        assert_eq!(task.task_type.as_deref(), Some("api-development"));
        assert_eq!(task.effective_priority(), Priority::High);
        assert_eq!(task.timeout_ms, Some(5_000));
        assert!(task.has_payload());
    }

    #[test]
    fn test_task_null_payload() {
        let task = Task::new("t-2", Value::Null);
        assert!(!task.has_payload());
    }

    #[test]
    fn test_task_deserialize_defaults() {
        let task: Task = serde_json::from_value(json!({
            "id": "t-3",
            "type": "testing",
            "payload": {"suite": "unit"}
        }))
        .unwrap();
        assert_eq!(task.task_type.as_deref(), Some("testing"));
        assert!(task.priority.is_none());
        assert_eq!(task.effective_priority(), Priority::Medium);
    }

    #[test]
    fn test_requirement_profile_serde() {
        let profile = RequirementProfile::new(
            CapabilitySet::from_tags(["testing"]).unwrap(),
            Complexity::Low,
            Duration::from_secs(30),
        )
        .with_channels(["filesystem"]);
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["estimated_duration_ms"], json!(30_000));
        assert_eq!(value["complexity"], json!("low"));
        let back: RequirementProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = TaskOutcome::succeeded(120);
        assert!(ok.success);
        assert!(ok.failure.is_none());

        let failed = TaskOutcome::failed(50, TaskFailure::timeout("exceeded 50ms"));
        assert!(!failed.success);
        assert!(failed.failure.as_ref().is_some_and(TaskFailure::is_timeout));
    }
}
