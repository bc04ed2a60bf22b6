//! Workflow templates.
//!
//! A template is a named set of phases. Each phase lists the roles it needs
//! (role names double as task types for requirement derivation), the phases
//! it depends on and the checks of its quality gate.

use crate::gate::CheckSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_required() -> bool {
    true
}

/// A stage of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Phase name, unique within the template
    pub name: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
    /// Roles executed concurrently within the phase
    #[serde(default)]
    pub roles: Vec<String>,
    /// Phases that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Quality gate checks
    #[serde(default)]
    pub quality_gate: Vec<CheckSpec>,
    /// Whether a failure of this phase marks the workflow as partially failed
    #[serde(default = "default_required")]
    pub required: bool,
}

impl PhaseSpec {
    /// Create a required phase with no roles or dependencies
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            roles: Vec::new(),
            depends_on: Vec::new(),
            quality_gate: Vec::new(),
            required: true,
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set roles
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Set dependencies
    #[must_use]
    pub fn depends_on<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = phases.into_iter().map(Into::into).collect();
        self
    }

    /// Add a quality gate check
    #[must_use]
    pub fn with_check(mut self, check: CheckSpec) -> Self {
        self.quality_gate.push(check);
        self
    }

    /// Mark the phase optional
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Named phase set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Template name
    pub name: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
    /// Phases in declaration order
    #[serde(default)]
    pub phases: Vec<PhaseSpec>,
}

impl WorkflowTemplate {
    /// Create an empty template
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            phases: Vec::new(),
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a phase
    #[must_use]
    pub fn with_phase(mut self, phase: PhaseSpec) -> Self {
        self.phases.push(phase);
        self
    }

    /// Look up a phase
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Every role used by the template, deduplicated in first-use order
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = Vec::new();
        for role in self.phases.iter().flat_map(|p| p.roles.iter()) {
            if !roles.contains(&role.as_str()) {
                roles.push(role);
            }
        }
        roles
    }
}

fn feature_development() -> WorkflowTemplate {
    WorkflowTemplate::new("feature-development")
        .with_description("Design, build, verify and ship a feature")
        .with_phase(
            PhaseSpec::new("specification")
                .with_description("Architecture and technical specification")
                .with_roles(["architecture"])
                .with_check(CheckSpec::AllRolesSucceeded),
        )
        .with_phase(
            PhaseSpec::new("implementation")
                .with_description("Backend and frontend implementation")
                .with_roles(["api-development", "ui-development"])
                .depends_on(["specification"])
                .with_check(CheckSpec::MinSuccessRatio { ratio: 0.5 }),
        )
        .with_phase(
            PhaseSpec::new("testing")
                .with_description("Automated tests for the implementation")
                .with_roles(["testing"])
                .depends_on(["implementation"])
                .with_check(CheckSpec::AllRolesSucceeded),
        )
        .with_phase(
            PhaseSpec::new("review")
                .with_description("Code review and security audit")
                .with_roles(["code-review", "security-audit"])
                .depends_on(["implementation"])
                .with_check(CheckSpec::NoErrors),
        )
        .with_phase(
            PhaseSpec::new("documentation")
                .with_description("User and API documentation")
                .with_roles(["documentation"])
                .depends_on(["implementation"])
                .optional(),
        )
        .with_phase(
            PhaseSpec::new("release")
                .with_description("Deployment")
                .with_roles(["deployment"])
                .depends_on(["testing", "review"])
                .optional(),
        )
}

fn bug_fix() -> WorkflowTemplate {
    WorkflowTemplate::new("bug-fix")
        .with_description("Investigate, fix and verify a defect")
        .with_phase(
            PhaseSpec::new("investigation")
                .with_description("Locate the root cause")
                .with_roles(["code-review"]),
        )
        .with_phase(
            PhaseSpec::new("fix")
                .with_description("Implement the fix")
                .with_roles(["code-generation"])
                .depends_on(["investigation"]),
        )
        .with_phase(
            PhaseSpec::new("verification")
                .with_description("Regression tests")
                .with_roles(["testing"])
                .depends_on(["fix"])
                .with_check(CheckSpec::AllRolesSucceeded),
        )
}

fn documentation() -> WorkflowTemplate {
    WorkflowTemplate::new("documentation")
        .with_description("Outline, write and review documentation")
        .with_phase(
            PhaseSpec::new("outline")
                .with_description("Structure of the document")
                .with_roles(["documentation"]),
        )
        .with_phase(
            PhaseSpec::new("write")
                .with_description("Write the content")
                .with_roles(["documentation"])
                .depends_on(["outline"])
                .with_check(CheckSpec::ArtifactsProduced { min: 1 }),
        )
        .with_phase(
            PhaseSpec::new("review")
                .with_description("Editorial review")
                .with_roles(["code-review"])
                .depends_on(["write"])
                .optional(),
        )
}

/// Templates by name
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: IndexMap<String, Arc<WorkflowTemplate>>,
}

impl TemplateLibrary {
    /// Create an empty library
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with `feature-development`, `bug-fix` and `documentation`
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_template(feature_development())
            .with_template(bug_fix())
            .with_template(documentation())
    }

    /// Add a template, replacing any template with the same name
    #[must_use]
    pub fn with_template(mut self, template: WorkflowTemplate) -> Self {
        self.templates
            .insert(template.name.clone(), Arc::new(template));
        self
    }

    /// Look up a template
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<WorkflowTemplate>> {
        self.templates.get(name).cloned()
    }

    /// Template names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    /// Iterate over templates
    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkflowTemplate>> {
        self.templates.values()
    }

    /// Number of templates
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if the library is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PhaseGraph;

    #[test]
    fn test_builtin_templates() {
        let library = TemplateLibrary::builtin();
        assert_eq!(library.names(), vec!["feature-development", "bug-fix", "documentation"]);
        for template in library.iter() {
            PhaseGraph::build(template).unwrap();
        }
        let feature = library.get("feature-development").unwrap();
        assert_eq!(feature.phases.len(), 6);
        assert!(!feature.phase("release").unwrap().required);
        assert!(feature.phase("testing").unwrap().required);
    }

    #[test]
    fn test_override_replaces_in_place() {
        let library = TemplateLibrary::builtin()
            .with_template(WorkflowTemplate::new("bug-fix").with_phase(PhaseSpec::new("patch")));
        assert_eq!(library.len(), 3);
        assert_eq!(library.names()[1], "bug-fix");
        assert_eq!(library.get("bug-fix").unwrap().phases.len(), 1);
    }

    #[test]
    fn test_roles_deduplicated() {
        let library = TemplateLibrary::builtin();
        let docs = library.get("documentation").unwrap();
        assert_eq!(docs.roles(), vec!["documentation", "code-review"]);
    }

    #[test]
    fn test_phase_spec_toml_defaults() {
        let phase: PhaseSpec = toml::from_str(
            r#"
            name = "lint"
            roles = ["code-review"]
            quality_gate = [{ check = "no-errors" }]
            "#,
        )
        .unwrap();
        assert!(phase.required);
        assert!(phase.depends_on.is_empty());
        assert_eq!(phase.quality_gate, vec![CheckSpec::NoErrors]);
    }
}
