//! Command implementations. Each returns the text to print.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use switchyard_core::{Priority, Task};
use switchyard_router::TaskRouter;
use switchyard_workflow::{OrchestratorConfig, PhaseGraph};
use tracing::{debug, info};

/// Load a config file, or the built-in defaults when no path is given
pub fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading config");
            OrchestratorConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => Ok(OrchestratorConfig::default()),
    }
}

fn parse_priority(value: &str) -> Result<Priority> {
    serde_json::from_value(json!(value.to_lowercase()))
        .map_err(|_| anyhow!("unknown priority '{}' (expected low, medium, high or critical)", value))
}

fn router_for(config: &OrchestratorConfig) -> Result<TaskRouter> {
    let registry = config.build_registry().context("invalid worker table")?;
    Ok(TaskRouter::new(Arc::new(registry), config.routing).with_rules(config.build_rules()))
}

pub fn validate(path: &Path) -> Result<String> {
    let config = load_config(Some(path))?;
    config
        .validate()
        .with_context(|| format!("{} is not a valid configuration", path.display()))?;
    info!(path = %path.display(), "Configuration valid");

    Ok(format!(
        "{}: ok ({} worker types, {} channels, {} templates, {} requirement rules)",
        path.display(),
        config.workers.len(),
        config.channels.len(),
        config.build_templates().len(),
        config.build_rules().len()
    ))
}

pub fn templates(path: Option<&Path>) -> Result<String> {
    let config = load_config(path)?;
    let mut out = String::new();
    for template in config.build_templates().iter() {
        let _ = writeln!(
            out,
            "{:<24} {} phases  {}",
            template.name,
            template.phases.len(),
            template.description
        );
    }
    Ok(out.trim_end().to_string())
}

/// Phase waves of a template, with the worker type each role would get
/// from an idle router
pub async fn plan(template: &str, path: Option<&Path>) -> Result<String> {
    let config = load_config(path)?;
    let library = config.build_templates();
    let template = library.get(template).ok_or_else(|| {
        anyhow!(
            "unknown template '{}' (available: {})",
            template,
            library.names().join(", ")
        )
    })?;
    let graph = PhaseGraph::build(&template)?;

    let mut out = String::new();
    let _ = writeln!(out, "template {}", template.name);
    let _ = writeln!(out, "order: {}", graph.order().join(" -> "));
    for (index, wave) in graph.waves().iter().enumerate() {
        let _ = writeln!(out, "wave {}:", index + 1);
        for phase_name in wave {
            let Some(phase) = template.phase(phase_name) else {
                continue;
            };
            let marker = if phase.required { "" } else { " (optional)" };
            let _ = writeln!(out, "  {}{}", phase.name, marker);
            for role in &phase.roles {
                // Fresh router per role so earlier picks do not skew load
                let router = router_for(&config)?;
                let task = Task::new(format!("plan:{}:{}", phase.name, role), json!({ "role": role }))
                    .with_type(role.as_str());
                match router.route(&task).await {
                    Ok(decision) => {
                        let _ = writeln!(out, "    {} -> {}", role, decision.selected_worker);
                    }
                    Err(e) => {
                        let _ = writeln!(out, "    {} -> unroutable: {}", role, e);
                    }
                }
            }
        }
    }
    Ok(out.trim_end().to_string())
}

/// Route one task and render the decision as JSON
pub async fn route(
    task_type: &str,
    payload: &str,
    priority: Option<&str>,
    path: Option<&Path>,
) -> Result<String> {
    let config = load_config(path)?;
    let payload: Value = serde_json::from_str(payload).context("payload is not valid JSON")?;
    if payload.is_null() {
        bail!("payload must not be null");
    }

    let mut task = Task::new(format!("cli-{}", task_type), payload).with_type(task_type);
    if let Some(priority) = priority {
        task = task.with_priority(parse_priority(priority)?);
    }

    let router = router_for(&config)?;
    let decision = router.route(&task).await?;
    Ok(serde_json::to_string_pretty(decision.as_ref())?)
}
