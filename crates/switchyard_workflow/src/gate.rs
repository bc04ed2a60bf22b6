//! Quality gates.
//!
//! A gate is the list of checks declared on a phase. It passes only when
//! every check passes; an empty gate always passes.

use crate::instance::PhaseResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A declared check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "kebab-case")]
pub enum CheckSpec {
    /// Every role of the phase succeeded
    AllRolesSucceeded,
    /// At least this share of roles succeeded
    MinSuccessRatio {
        /// Required share in `[0, 1]`
        ratio: f64,
    },
    /// No role reported an error
    NoErrors,
    /// Roles produced at least this many artifacts in total
    ArtifactsProduced {
        /// Minimum artifact count
        min: usize,
    },
    /// Every successful role output carries these top-level fields
    OutputFields {
        /// Required field names
        fields: Vec<String>,
    },
    /// The phase finished within this many milliseconds
    MaxDuration {
        /// Limit in milliseconds
        ms: u64,
    },
    /// Host-registered check
    Named {
        /// Registered name
        name: String,
    },
}

impl CheckSpec {
    /// Name used in gate results
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::AllRolesSucceeded => "all-roles-succeeded".to_string(),
            Self::MinSuccessRatio { .. } => "min-success-ratio".to_string(),
            Self::NoErrors => "no-errors".to_string(),
            Self::ArtifactsProduced { .. } => "artifacts-produced".to_string(),
            Self::OutputFields { .. } => "output-fields".to_string(),
            Self::MaxDuration { .. } => "max-duration".to_string(),
            Self::Named { name } => name.clone(),
        }
    }
}

/// Verdict of a single check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckVerdict {
    /// Whether the check passed
    pub passed: bool,
    /// Explanation
    pub message: String,
}

impl CheckVerdict {
    /// Passing verdict
    #[must_use]
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    /// Failing verdict
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    fn from_condition(passed: bool, message: String) -> Self {
        Self { passed, message }
    }
}

/// Named check result within a gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether it passed
    pub passed: bool,
    /// Explanation
    pub message: String,
}

/// Outcome of a phase's quality gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGateResult {
    /// Phase name
    pub phase: String,
    /// True when every check passed
    pub passed: bool,
    /// Individual checks in declaration order
    pub checks: Vec<CheckResult>,
}

impl QualityGateResult {
    /// Names of the failed checks
    #[must_use]
    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Host-supplied check, referenced from templates by name
pub trait QualityCheck: Send + Sync {
    /// Registered name
    fn name(&self) -> &str;

    /// Evaluate the check against a finished phase
    fn evaluate(&self, phase: &PhaseResult) -> CheckVerdict;
}

/// Registry of host-supplied checks
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: IndexMap<String, Arc<dyn QualityCheck>>,
}

impl CheckRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check, replacing any check with the same name
    #[must_use]
    pub fn with_check(mut self, check: Arc<dyn QualityCheck>) -> Self {
        self.checks.insert(check.name().to_string(), check);
        self
    }

    /// Look up a check
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn QualityCheck>> {
        self.checks.get(name)
    }

    /// Registered names
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.checks.keys().cloned().collect()
    }
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.names())
            .finish()
    }
}

fn run_check(spec: &CheckSpec, phase: &PhaseResult, registry: &CheckRegistry) -> CheckVerdict {
    match spec {
        CheckSpec::AllRolesSucceeded => {
            let failed = phase.failed_roles();
            CheckVerdict::from_condition(
                failed.is_empty(),
                if failed.is_empty() {
                    format!("{} roles succeeded", phase.roles.len())
                } else {
                    format!("roles failed: {}", failed.join(", "))
                },
            )
        }
        CheckSpec::MinSuccessRatio { ratio } => {
            let actual = phase.success_ratio();
            CheckVerdict::from_condition(
                actual >= *ratio,
                format!("success ratio {:.2} (required {:.2})", actual, ratio),
            )
        }
        CheckSpec::NoErrors => {
            let errors = phase.errors();
            CheckVerdict::from_condition(
                errors.is_empty(),
                if errors.is_empty() {
                    "no errors reported".to_string()
                } else {
                    format!("{} errors reported: {}", errors.len(), errors.join("; "))
                },
            )
        }
        CheckSpec::ArtifactsProduced { min } => {
            let count = phase.artifacts().len();
            CheckVerdict::from_condition(
                count >= *min,
                format!("{} artifacts produced (required {})", count, min),
            )
        }
        CheckSpec::OutputFields { fields } => {
            let missing: Vec<String> = phase
                .roles
                .iter()
                .filter(|r| r.success)
                .flat_map(|r| {
                    fields
                        .iter()
                        .filter(move |field| {
                            r.output
                                .as_ref()
                                .and_then(|o| o.data.get(field.as_str()))
                                .is_none()
                        })
                        .map(move |field| format!("{}.{}", r.role, field))
                })
                .collect();
            CheckVerdict::from_condition(
                missing.is_empty(),
                if missing.is_empty() {
                    "all required output fields present".to_string()
                } else {
                    format!("missing output fields: {}", missing.join(", "))
                },
            )
        }
        CheckSpec::MaxDuration { ms } => CheckVerdict::from_condition(
            phase.duration_ms <= *ms,
            format!("phase took {}ms (limit {}ms)", phase.duration_ms, ms),
        ),
        CheckSpec::Named { name } => match registry.get(name) {
            Some(check) => check.evaluate(phase),
            None => CheckVerdict::fail(format!("no quality check registered as '{}'", name)),
        },
    }
}

/// Run a phase's gate
#[must_use]
pub fn evaluate_gate(
    checks: &[CheckSpec],
    phase: &PhaseResult,
    registry: &CheckRegistry,
) -> QualityGateResult {
    let checks: Vec<CheckResult> = checks
        .iter()
        .map(|spec| {
            let verdict = run_check(spec, phase, registry);
            CheckResult {
                name: spec.name(),
                passed: verdict.passed,
                message: verdict.message,
            }
        })
        .collect();
    QualityGateResult {
        phase: phase.phase.clone(),
        passed: checks.iter().all(|c| c.passed),
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::RoleResult;
    use crate::worker::WorkerOutput;
    use serde_json::json;
    use switchyard_core::TaskId;

    fn role(name: &str, success: bool, data: serde_json::Value, artifacts: &[&str]) -> RoleResult {
        RoleResult {
            role: name.to_string(),
            task_id: TaskId::unchecked(format!("wf:build:{name}")),
            worker_type: Some("worker".to_string()),
            success,
            output: success.then(|| WorkerOutput {
                data,
                artifacts: artifacts.iter().map(|a| (*a).to_string()).collect(),
            }),
            error: (!success).then(|| format!("{name} crashed")),
            duration_ms: 10,
        }
    }

    fn phase(roles: Vec<RoleResult>, duration_ms: u64) -> PhaseResult {
        PhaseResult {
            phase: "build".to_string(),
            success: roles.iter().any(|r| r.success),
            roles,
            duration_ms,
        }
    }

    struct HasSummary;

    impl QualityCheck for HasSummary {
        fn name(&self) -> &str {
            "has-summary"
        }

        fn evaluate(&self, phase: &PhaseResult) -> CheckVerdict {
            if phase.roles.iter().any(|r| r.output.as_ref().is_some_and(|o| o.data.get("summary").is_some())) {
                CheckVerdict::pass("summary present")
            } else {
                CheckVerdict::fail("summary missing")
            }
        }
    }

    #[test]
    fn test_empty_gate_passes() {
        let result = evaluate_gate(&[], &phase(vec![], 0), &CheckRegistry::new());
        assert!(result.passed);
        assert!(result.checks.is_empty());
    }

    #[test]
    fn test_role_checks() {
        let p = phase(
            vec![
                role("api", true, json!({"summary": "ok"}), &["src/api.rs"]),
                role("ui", false, json!({}), &[]),
            ],
            50,
        );
        let gate = evaluate_gate(
            &[
                CheckSpec::AllRolesSucceeded,
                CheckSpec::MinSuccessRatio { ratio: 0.5 },
                CheckSpec::NoErrors,
                CheckSpec::ArtifactsProduced { min: 1 },
            ],
            &p,
            &CheckRegistry::new(),
        );
        assert!(!gate.passed);
        assert_eq!(gate.failed_checks(), vec!["all-roles-succeeded", "no-errors"]);
        assert!(gate.checks[0].message.contains("ui"));
    }

    #[test]
    fn test_output_fields_and_duration() {
        let p = phase(vec![role("api", true, json!({"summary": "ok"}), &[])], 500);
        let gate = evaluate_gate(
            &[
                CheckSpec::OutputFields {
                    fields: vec!["summary".to_string(), "diff".to_string()],
                },
                CheckSpec::MaxDuration { ms: 100 },
            ],
            &p,
            &CheckRegistry::new(),
        );
        assert_eq!(gate.failed_checks(), vec!["output-fields", "max-duration"]);
        assert!(gate.checks[0].message.contains("api.diff"));
    }

    #[test]
    fn test_named_checks() {
        let registry = CheckRegistry::new().with_check(Arc::new(HasSummary));
        let p = phase(vec![role("api", true, json!({"summary": "ok"}), &[])], 5);
        let gate = evaluate_gate(
            &[
                CheckSpec::Named { name: "has-summary".to_string() },
                CheckSpec::Named { name: "lint".to_string() },
            ],
            &p,
            &registry,
        );
        assert!(gate.checks[0].passed);
        assert!(!gate.checks[1].passed);
        assert!(gate.checks[1].message.contains("lint"));
    }

    #[test]
    fn test_check_spec_serde() {
        let spec: CheckSpec = serde_json::from_value(json!({"check": "min-success-ratio", "ratio": 0.75})).unwrap();
        assert_eq!(spec, CheckSpec::MinSuccessRatio { ratio: 0.75 });
        let named: CheckSpec = serde_json::from_value(json!({"check": "named", "name": "lint"})).unwrap();
        assert_eq!(named.name(), "lint");
        let unit = serde_json::to_value(CheckSpec::NoErrors).unwrap();
        assert_eq!(unit, json!({"check": "no-errors"}));
    }
}
