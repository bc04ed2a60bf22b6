//! Workflow instances and results.

use crate::gate::QualityGateResult;
use crate::worker::WorkerOutput;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchyard_core::{Priority, TaskId, Timestamp, WorkflowId, now};

/// Workflow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStatus {
    /// Materialized, not started
    Created,
    /// Executing phases
    Running,
    /// Every required phase completed
    Completed,
    /// Finished, but a required phase failed or was skipped
    CompletedWithFailures,
    /// Aborted, abandoned, or nothing completed
    Failed,
}

impl WorkflowStatus {
    /// Completed, partially completed and failed are terminal
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithFailures | Self::Failed
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::CompletedWithFailures => f.write_str("completed-with-failures"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Per-workflow execution options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowOptions {
    /// Run every ready phase at once instead of one at a time
    pub concurrent_phases: bool,
    /// Any role failure or failed gate aborts the workflow
    pub strict_mode: bool,
    /// Evaluate quality gates after successful phases
    pub quality_gates_enabled: bool,
    /// Priority given to role tasks
    pub priority: Priority,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            concurrent_phases: false,
            strict_mode: false,
            quality_gates_enabled: true,
            priority: Priority::Medium,
        }
    }
}

impl WorkflowOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run ready phases concurrently
    #[must_use]
    pub fn with_concurrent_phases(mut self, enabled: bool) -> Self {
        self.concurrent_phases = enabled;
        self
    }

    /// Abort on any failure
    #[must_use]
    pub fn with_strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    /// Enable or disable quality gates
    #[must_use]
    pub fn with_quality_gates(mut self, enabled: bool) -> Self {
        self.quality_gates_enabled = enabled;
        self
    }

    /// Set role task priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Result of one role within a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleResult {
    /// Role name, also the task type
    pub role: String,
    /// Task id used for routing
    pub task_id: TaskId,
    /// Worker type the router selected, if routing succeeded
    pub worker_type: Option<String>,
    /// Whether the role succeeded
    pub success: bool,
    /// Worker output on success
    pub output: Option<WorkerOutput>,
    /// Error message on failure
    pub error: Option<String>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// Result of a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Phase name
    pub phase: String,
    /// Phase verdict under the workflow's failure policy
    pub success: bool,
    /// Role results in declaration order
    pub roles: Vec<RoleResult>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl PhaseResult {
    /// Names of roles that failed
    #[must_use]
    pub fn failed_roles(&self) -> Vec<&str> {
        self.roles
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.role.as_str())
            .collect()
    }

    /// Share of roles that succeeded; a phase without roles counts as 1.0
    #[must_use]
    pub fn success_ratio(&self) -> f64 {
        if self.roles.is_empty() {
            return 1.0;
        }
        let succeeded = self.roles.iter().filter(|r| r.success).count();
        succeeded as f64 / self.roles.len() as f64
    }

    /// Role errors, prefixed with the role name
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.roles
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.role, e)))
            .collect()
    }

    /// Artifacts produced by all roles, in role order
    #[must_use]
    pub fn artifacts(&self) -> Vec<String> {
        self.roles
            .iter()
            .filter_map(|r| r.output.as_ref())
            .flat_map(|o| o.artifacts.iter().cloned())
            .collect()
    }
}

/// Live state of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Instance id
    pub id: WorkflowId,
    /// Template name
    pub template: String,
    /// Caller's task definition, handed to every role
    pub task_definition: Value,
    /// Execution options
    pub options: WorkflowOptions,
    /// Status
    pub status: WorkflowStatus,
    /// Phase being executed, if any
    pub current_phase: Option<String>,
    /// Phases that succeeded
    pub completed_phases: Vec<String>,
    /// Phases that failed
    pub failed_phases: Vec<String>,
    /// Phases never attempted because a dependency did not complete
    pub skipped_phases: Vec<String>,
    /// Phase results keyed by phase name
    pub phase_results: IndexMap<String, PhaseResult>,
    /// Gate results keyed by phase name
    pub gate_results: IndexMap<String, QualityGateResult>,
    /// Errors
    pub errors: Vec<String>,
    /// Warnings
    pub warnings: Vec<String>,
    /// Creation time
    pub created_at: Timestamp,
    /// Start of execution
    pub started_at: Option<Timestamp>,
    /// End of execution
    pub finished_at: Option<Timestamp>,
    /// Set when the caller abandoned the workflow
    pub abandoned: bool,
}

impl WorkflowInstance {
    /// Fresh instance in the created state
    #[must_use]
    pub fn new(template: impl Into<String>, task_definition: Value, options: WorkflowOptions) -> Self {
        Self {
            id: WorkflowId::new(),
            template: template.into(),
            task_definition,
            options,
            status: WorkflowStatus::Created,
            current_phase: None,
            completed_phases: Vec::new(),
            failed_phases: Vec::new(),
            skipped_phases: Vec::new(),
            phase_results: IndexMap::new(),
            gate_results: IndexMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            created_at: now(),
            started_at: None,
            finished_at: None,
            abandoned: false,
        }
    }

    /// Whether a phase reached a terminal state
    #[must_use]
    pub fn is_settled(&self, phase: &str) -> bool {
        let named = |list: &[String]| list.iter().any(|p| p == phase);
        named(&self.completed_phases) || named(&self.failed_phases) || named(&self.skipped_phases)
    }

    /// Execution time so far, or in total once finished
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        let Some(started) = self.started_at else {
            return 0;
        };
        let end = self.finished_at.unwrap_or_else(now);
        u64::try_from((end - started).num_milliseconds()).unwrap_or(0)
    }
}

/// Final report of an executed workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Instance id
    pub workflow_id: WorkflowId,
    /// Template name
    pub template: String,
    /// Terminal status
    pub status: WorkflowStatus,
    /// Phase results keyed by phase name
    pub phase_results: IndexMap<String, PhaseResult>,
    /// Gate results keyed by phase name
    pub gate_results: IndexMap<String, QualityGateResult>,
    /// Phases that succeeded
    pub completed_phases: Vec<String>,
    /// Phases that failed
    pub failed_phases: Vec<String>,
    /// Phases never attempted
    pub skipped_phases: Vec<String>,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// Artifacts from every phase, in execution order
    pub artifacts: Vec<String>,
    /// Warnings
    pub warnings: Vec<String>,
    /// Errors
    pub errors: Vec<String>,
}

impl WorkflowResult {
    /// Assemble a result from a finished instance
    #[must_use]
    pub fn from_instance(instance: &WorkflowInstance) -> Self {
        Self {
            workflow_id: instance.id,
            template: instance.template.clone(),
            status: instance.status,
            phase_results: instance.phase_results.clone(),
            gate_results: instance.gate_results.clone(),
            completed_phases: instance.completed_phases.clone(),
            failed_phases: instance.failed_phases.clone(),
            skipped_phases: instance.skipped_phases.clone(),
            duration_ms: instance.duration_ms(),
            artifacts: instance
                .phase_results
                .values()
                .flat_map(PhaseResult::artifacts)
                .collect(),
            warnings: instance.warnings.clone(),
            errors: instance.errors.clone(),
        }
    }

    /// Whether every required phase completed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }
}

/// Compact record kept after an instance leaves the live table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Instance id
    pub id: WorkflowId,
    /// Template name
    pub template: String,
    /// Terminal status
    pub status: WorkflowStatus,
    /// Number of completed phases
    pub completed: usize,
    /// Number of failed phases
    pub failed: usize,
    /// Number of skipped phases
    pub skipped: usize,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// End of execution
    pub finished_at: Option<Timestamp>,
}

impl From<&WorkflowInstance> for WorkflowSummary {
    fn from(instance: &WorkflowInstance) -> Self {
        Self {
            id: instance.id,
            template: instance.template.clone(),
            status: instance.status,
            completed: instance.completed_phases.len(),
            failed: instance.failed_phases.len(),
            skipped: instance.skipped_phases.len(),
            duration_ms: instance.duration_ms(),
            finished_at: instance.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn role(name: &str, success: bool, artifacts: &[&str]) -> RoleResult {
        RoleResult {
            role: name.to_string(),
            task_id: TaskId::unchecked(format!("wf:p:{name}")),
            worker_type: None,
            success,
            output: success.then(|| WorkerOutput::new(json!({})).with_artifacts(artifacts.iter().copied())),
            error: (!success).then(|| "boom".to_string()),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_phase_result_aggregates() {
        let phase = PhaseResult {
            phase: "build".to_string(),
            success: true,
            roles: vec![role("api", true, &["a.rs", "b.rs"]), role("ui", false, &[]), role("db", true, &["c.sql"])],
            duration_ms: 3,
        };
        assert_eq!(phase.failed_roles(), vec!["ui"]);
        assert!((phase.success_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(phase.errors(), vec!["ui: boom".to_string()]);
        assert_eq!(phase.artifacts(), vec!["a.rs", "b.rs", "c.sql"]);
    }

    #[test]
    fn test_empty_phase_ratio() {
        let phase = PhaseResult {
            phase: "noop".to_string(),
            success: true,
            roles: vec![],
            duration_ms: 0,
        };
        assert!((phase.success_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_terminal_and_serde() {
        assert!(!WorkflowStatus::Created.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(WorkflowStatus::CompletedWithFailures.is_terminal());
        assert_eq!(
            serde_json::to_value(WorkflowStatus::CompletedWithFailures).unwrap(),
            json!("completed-with-failures")
        );
        assert_eq!(WorkflowStatus::CompletedWithFailures.to_string(), "completed-with-failures");
    }

    #[test]
    fn test_options_defaults_from_partial_json() {
        let options: WorkflowOptions = serde_json::from_value(json!({"strict_mode": true})).unwrap();
        assert!(options.strict_mode);
        assert!(options.quality_gates_enabled);
        assert!(!options.concurrent_phases);
        assert_eq!(options.priority, Priority::Medium);
    }

    #[test]
    fn test_instance_settled_and_summary() {
        let mut instance = WorkflowInstance::new("bug-fix", json!({"issue": 7}), WorkflowOptions::default());
        assert_eq!(instance.status, WorkflowStatus::Created);
        assert_eq!(instance.duration_ms(), 0);
        instance.completed_phases.push("investigation".to_string());
        instance.skipped_phases.push("verification".to_string());
        assert!(instance.is_settled("investigation"));
        assert!(instance.is_settled("verification"));
        assert!(!instance.is_settled("fix"));

        let summary = WorkflowSummary::from(&instance);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.template, "bug-fix");
    }
}
