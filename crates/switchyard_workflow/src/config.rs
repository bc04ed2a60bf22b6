//! Orchestrator configuration.
//!
//! One immutable document describes the worker table, the channels, the
//! router, the backend manager and the coordinator. It is read once at
//! construction time from TOML or JSON, chosen by file extension.

use crate::coordinator::CoordinatorConfig;
use crate::error::WorkflowError;
use crate::graph::PhaseGraph;
use crate::template::{TemplateLibrary, WorkflowTemplate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use switchyard_backend::{BackendConfig, ChannelSpec};
use switchyard_core::{Capability, CapabilitySet, Complexity, Task};
use switchyard_router::{CapabilityProfile, CapabilityRegistry, RequirementRule, RequirementRules, RouterConfig};

fn worker(
    name: &str,
    capabilities: &[&'static str],
    complexity: Complexity,
    limit: u32,
    minutes: u64,
) -> CapabilityProfile {
    let capabilities: CapabilitySet = capabilities
        .iter()
        .map(|c| Capability::from_static(*c))
        .collect();
    CapabilityProfile::new(name, capabilities)
        .with_complexity(complexity)
        .with_concurrency_limit(limit)
        .with_nominal_duration(Duration::from_secs(minutes * 60))
}

fn specializations(tags: &[&'static str]) -> CapabilitySet {
    tags.iter()
        .map(|c| Capability::from_static(*c))
        .collect()
}

/// Worker table used when the configuration does not declare one
#[must_use]
pub fn builtin_workers() -> Vec<CapabilityProfile> {
    use Complexity::{High, Low, Medium};
    vec![
        worker("architect", &["architecture", "code-review"], High, 2, 30)
            .with_specializations(specializations(&["architecture"])),
        worker(
            "backend-developer",
            &["api-development", "code-generation", "database"],
            Medium,
            3,
            15,
        )
        .with_specializations(specializations(&["api-development", "database"])),
        worker("frontend-developer", &["ui-development", "code-generation"], Medium, 3, 15)
            .with_specializations(specializations(&["ui-development"])),
        worker("tester", &["testing"], Low, 4, 5).with_channels(["filesystem"]),
        worker("reviewer", &["code-review", "security"], High, 2, 10)
            .with_specializations(specializations(&["security"])),
        worker("technical-writer", &["documentation"], Low, 3, 5).with_channels(["filesystem"]),
        worker("devops", &["deployment"], High, 2, 20).with_channels(["cloud"]),
    ]
}

/// Complete orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Worker types; replaces the built-in table when present
    pub workers: Vec<CapabilityProfile>,
    /// Backend channels
    pub channels: Vec<ChannelSpec>,
    /// Router settings
    pub routing: RouterConfig,
    /// Backend manager settings
    pub backend: BackendConfig,
    /// Coordinator settings
    pub workflow: CoordinatorConfig,
    /// Templates added to, or replacing, the built-in ones
    pub templates: Vec<WorkflowTemplate>,
    /// Requirement rules added to, or replacing, the built-in ones
    pub requirement_rules: Vec<RequirementRule>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: builtin_workers(),
            channels: Vec::new(),
            routing: RouterConfig::default(),
            backend: BackendConfig::default(),
            workflow: CoordinatorConfig::default(),
            templates: Vec::new(),
            requirement_rules: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from a `.toml` or `.json` file
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed, or has an
    /// unsupported extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| WorkflowError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(WorkflowError::Config(format!(
                "unsupported config format '{}' for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    /// Parse TOML
    ///
    /// # Errors
    ///
    /// Returns `Config` on malformed input
    pub fn from_toml_str(content: &str) -> Result<Self, WorkflowError> {
        toml::from_str(content).map_err(|e| WorkflowError::Config(format!("invalid TOML: {}", e)))
    }

    /// Parse JSON
    ///
    /// # Errors
    ///
    /// Returns `Config` on malformed input
    pub fn from_json_str(content: &str) -> Result<Self, WorkflowError> {
        serde_json::from_str(content).map_err(|e| WorkflowError::Config(format!("invalid JSON: {}", e)))
    }

    /// Capability registry from the worker table
    ///
    /// # Errors
    ///
    /// Returns `Core` on an invalid or duplicate worker type
    pub fn build_registry(&self) -> Result<CapabilityRegistry, WorkflowError> {
        Ok(CapabilityRegistry::new(self.workers.iter().cloned())?)
    }

    /// Built-in requirement rules overlaid with the configured ones
    #[must_use]
    pub fn build_rules(&self) -> RequirementRules {
        self.requirement_rules
            .iter()
            .cloned()
            .fold(RequirementRules::builtin(), RequirementRules::with_rule)
    }

    /// Built-in templates overlaid with the configured ones
    #[must_use]
    pub fn build_templates(&self) -> TemplateLibrary {
        self.templates
            .iter()
            .cloned()
            .fold(TemplateLibrary::builtin(), TemplateLibrary::with_template)
    }

    /// Check internal consistency
    ///
    /// Every worker and channel must be valid and uniquely named, every
    /// template must form a DAG, and every template role must be servable by
    /// at least one worker type.
    ///
    /// # Errors
    ///
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let registry = self.build_registry()?;

        let mut names = HashSet::new();
        for channel in &self.channels {
            channel.validate()?;
            if !names.insert(channel.name.as_str()) {
                return Err(WorkflowError::Config(format!(
                    "duplicate channel '{}'",
                    channel.name
                )));
            }
        }

        let rules = self.build_rules();
        for template in self.build_templates().iter() {
            PhaseGraph::build(template)?;
            for role in template.roles() {
                let probe = Task::new(role, json!({ "role": role })).with_type(role);
                let requirements = rules.derive(&probe);
                if registry.candidates_for(&requirements.capabilities).is_empty() {
                    return Err(WorkflowError::Config(format!(
                        "role '{}' in template '{}' needs [{}], which no worker type serves",
                        role, template.name, requirements.capabilities
                    )));
                }
            }
        }
        Ok(())
    }
}
