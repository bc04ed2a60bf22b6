//! Workflow coordinator.
//!
//! Instances live in an id-keyed table behind a `tokio::sync::RwLock`. An
//! executing workflow works on its own copy and writes it back after every
//! phase batch, so readers see progress and an abandonment recorded in the
//! table always wins over the executor's copy.

use crate::error::WorkflowError;
use crate::gate::{CheckRegistry, evaluate_gate};
use crate::graph::PhaseGraph;
use crate::hooks::{DEFAULT_HOOK_TIMEOUT, HookDispatcher, HookEvent, HookKind};
use crate::instance::{
    PhaseResult, RoleResult, WorkflowInstance, WorkflowOptions, WorkflowResult, WorkflowStatus,
    WorkflowSummary,
};
use crate::template::{PhaseSpec, TemplateLibrary, WorkflowTemplate};
use crate::worker::{WorkerContext, WorkerError, WorkerExecutor};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_core::time::{age, duration_ms};
use switchyard_core::{Task, TaskId, TaskOutcome, WorkflowId, elapsed_ms, now};
use switchyard_router::TaskRouter;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Coordinator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Options used when a workflow is created without any
    pub default_options: WorkflowOptions,
    /// How long terminal instances stay in the live table
    #[serde(rename = "retention_ms", with = "duration_ms")]
    pub retention: Duration,
    /// Maximum archived summaries
    pub archive_limit: usize,
    /// Bound on each hook delivery
    #[serde(rename = "hook_timeout_ms", with = "duration_ms")]
    pub hook_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_options: WorkflowOptions::default(),
            retention: Duration::from_secs(3600),
            archive_limit: 100,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }
}

impl CoordinatorConfig {
    /// Set default workflow options
    #[must_use]
    pub fn with_default_options(mut self, options: WorkflowOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Set instance retention
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set archive bound
    #[must_use]
    pub fn with_archive_limit(mut self, limit: usize) -> Self {
        self.archive_limit = limit;
        self
    }

    /// Set the hook delivery bound
    #[must_use]
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }
}

/// Read-only view of an instance handed to phase execution
struct RunScope<'a> {
    id: WorkflowId,
    template: &'a WorkflowTemplate,
    task_definition: &'a Value,
    options: WorkflowOptions,
    prior: &'a IndexMap<String, PhaseResult>,
}

/// Executes workflow templates against task definitions
pub struct WorkflowCoordinator {
    router: Arc<TaskRouter>,
    executor: Arc<dyn WorkerExecutor>,
    templates: TemplateLibrary,
    checks: CheckRegistry,
    hooks: Arc<HookDispatcher>,
    config: CoordinatorConfig,
    instances: RwLock<IndexMap<WorkflowId, WorkflowInstance>>,
    archive: RwLock<VecDeque<WorkflowSummary>>,
}

impl WorkflowCoordinator {
    /// Create a coordinator with the built-in templates
    #[must_use]
    pub fn new(router: Arc<TaskRouter>, executor: Arc<dyn WorkerExecutor>) -> Self {
        Self {
            router,
            executor,
            templates: TemplateLibrary::builtin(),
            checks: CheckRegistry::new(),
            hooks: Arc::new(HookDispatcher::new()),
            config: CoordinatorConfig::default(),
            instances: RwLock::new(IndexMap::new()),
            archive: RwLock::new(VecDeque::new()),
        }
    }

    /// Replace the template library
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateLibrary) -> Self {
        self.templates = templates;
        self
    }

    /// Replace the check registry
    #[must_use]
    pub fn with_checks(mut self, checks: CheckRegistry) -> Self {
        self.checks = checks;
        self
    }

    /// Replace the hook dispatcher
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<HookDispatcher>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Template library
    #[must_use]
    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    /// Hook dispatcher
    #[must_use]
    pub fn hooks(&self) -> &Arc<HookDispatcher> {
        &self.hooks
    }

    /// Coordinator configuration
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Validate a template and materialize an instance
    ///
    /// Nothing is recorded when validation fails.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTemplate`, `InvalidTemplate` or `CyclicWorkflow`
    pub async fn create_workflow(
        &self,
        template: &str,
        task_definition: Value,
        options: Option<WorkflowOptions>,
    ) -> Result<WorkflowId, WorkflowError> {
        let template = self
            .templates
            .get(template)
            .ok_or_else(|| WorkflowError::UnknownTemplate(template.to_string()))?;
        let graph = PhaseGraph::build(&template)?;

        let options = options.unwrap_or(self.config.default_options);
        let instance = WorkflowInstance::new(template.name.clone(), task_definition, options);
        let id = instance.id;
        self.instances.write().await.insert(id, instance);
        info!(
            workflow_id = %id,
            template = %template.name,
            phases = graph.len(),
            strict = options.strict_mode,
            concurrent = options.concurrent_phases,
            "Created workflow"
        );
        Ok(id)
    }

    /// Snapshot of an instance
    pub async fn instance(&self, id: WorkflowId) -> Option<WorkflowInstance> {
        self.instances.read().await.get(&id).cloned()
    }

    /// Snapshots of every live instance, in creation order
    pub async fn instances(&self) -> Vec<WorkflowInstance> {
        self.instances.read().await.values().cloned().collect()
    }

    /// Summaries of archived instances, oldest first
    pub async fn archived(&self) -> Vec<WorkflowSummary> {
        self.archive.read().await.iter().cloned().collect()
    }

    /// Abandon a workflow
    ///
    /// Role tasks already dispatched run to completion but their results are
    /// discarded, and no further phase is scheduled.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `InvalidState` for a
    /// workflow that already finished.
    pub async fn abandon_workflow(&self, id: WorkflowId) -> Result<(), WorkflowError> {
        let mut instances = self.instances.write().await;
        let instance = instances.get_mut(&id).ok_or(WorkflowError::NotFound(id))?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                id,
                status: instance.status,
            });
        }
        instance.abandoned = true;
        instance.status = WorkflowStatus::Failed;
        instance.finished_at = Some(now());
        instance.errors.push("workflow abandoned".to_string());
        warn!(workflow_id = %id, phase = instance.current_phase.as_deref().unwrap_or(""), "Workflow abandoned");
        Ok(())
    }

    /// Move terminal instances past their retention into the archive
    ///
    /// Returns the number of archived instances.
    pub async fn archive_expired(&self) -> usize {
        let mut instances = self.instances.write().await;
        let expired: Vec<WorkflowId> = instances
            .values()
            .filter(|i| i.status.is_terminal())
            .filter(|i| i.finished_at.is_some_and(|at| age(at) >= self.config.retention))
            .map(|i| i.id)
            .collect();
        if expired.is_empty() {
            return 0;
        }

        let mut archive = self.archive.write().await;
        for id in &expired {
            if let Some(instance) = instances.shift_remove(id) {
                archive.push_back(WorkflowSummary::from(&instance));
            }
        }
        while archive.len() > self.config.archive_limit {
            archive.pop_front();
        }
        debug!(archived = expired.len(), retained = archive.len(), "Archived workflows");
        expired.len()
    }

    /// Run a created workflow to a terminal status
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidState` when the workflow cannot start,
    /// `PhaseFailed` or `QualityGate` when strict mode aborts it, and
    /// `Abandoned` when it was abandoned while running. Execution errors
    /// carry the instance state.
    pub async fn execute_workflow(&self, id: WorkflowId) -> Result<WorkflowResult, WorkflowError> {
        let mut instance = {
            let mut instances = self.instances.write().await;
            let instance = instances.get_mut(&id).ok_or(WorkflowError::NotFound(id))?;
            if instance.status != WorkflowStatus::Created {
                return Err(WorkflowError::InvalidState {
                    id,
                    status: instance.status,
                });
            }
            instance.status = WorkflowStatus::Running;
            instance.started_at = Some(now());
            instance.clone()
        };

        let template = self
            .templates
            .get(&instance.template)
            .ok_or_else(|| WorkflowError::UnknownTemplate(instance.template.clone()))?;
        let graph = PhaseGraph::build(&template)?;

        info!(workflow_id = %id, template = %template.name, "Starting workflow");
        self.hooks
            .dispatch(
                HookEvent::new(HookKind::PreWorkflow, id, template.name.clone()).with_payload(json!({
                    "task_definition": instance.task_definition,
                    "options": instance.options,
                })),
            )
            .await;

        loop {
            if self.sync(&mut instance).await {
                return Err(self.abandoned(id).await);
            }

            self.skip_blocked(&graph, &mut instance);
            let ready: Vec<&PhaseSpec> = graph
                .order()
                .iter()
                .filter(|name| !instance.is_settled(name))
                .filter(|name| {
                    graph
                        .dependencies(name)
                        .iter()
                        .all(|d| instance.completed_phases.contains(d))
                })
                .filter_map(|name| template.phase(name))
                .collect();
            let Some(first) = ready.first() else {
                break;
            };
            let batch: Vec<&PhaseSpec> = if instance.options.concurrent_phases {
                ready.clone()
            } else {
                vec![*first]
            };

            instance.current_phase = Some(first.name.clone());
            self.sync(&mut instance).await;

            let results = {
                let scope = RunScope {
                    id,
                    template: &template,
                    task_definition: &instance.task_definition,
                    options: instance.options,
                    prior: &instance.phase_results,
                };
                join_all(batch.iter().map(|phase| self.run_phase(&scope, phase))).await
            };

            // Late results of an abandoned workflow are discarded
            if self.is_abandoned(id).await {
                return Err(self.abandoned(id).await);
            }

            for (phase, result) in batch.iter().zip(results) {
                if let Err(e) = self.settle_phase(&mut instance, phase, result).await {
                    self.finish(&mut instance, WorkflowStatus::Failed).await;
                    return Err(e);
                }
            }
        }

        let status = self.terminal_status(&template, &mut instance);
        self.finish(&mut instance, status).await;
        Ok(WorkflowResult::from_instance(&instance))
    }

    /// Mark phases whose dependencies failed or were skipped
    fn skip_blocked(&self, graph: &PhaseGraph, instance: &mut WorkflowInstance) {
        let mut blocked: IndexMap<String, String> = IndexMap::new();
        for failed in &instance.failed_phases {
            for dependent in graph.transitive_dependents(failed) {
                blocked.entry(dependent).or_insert_with(|| failed.clone());
            }
        }
        for phase in graph.order() {
            if instance.is_settled(phase) {
                continue;
            }
            if let Some(failed) = blocked.get(phase) {
                debug!(workflow_id = %instance.id, phase = %phase, blocked_by = %failed, "Skipping phase");
                instance.skipped_phases.push(phase.clone());
                instance
                    .warnings
                    .push(format!("phase '{}' skipped: upstream phase '{}' failed", phase, failed));
            }
        }
    }

    /// Record a phase result, run its gate and apply the failure policy
    async fn settle_phase(
        &self,
        instance: &mut WorkflowInstance,
        phase: &PhaseSpec,
        result: PhaseResult,
    ) -> Result<(), WorkflowError> {
        let strict = instance.options.strict_mode;
        let success = result.success;
        let mut gate_passed = None;

        if success {
            if instance.options.quality_gates_enabled {
                let gate = evaluate_gate(&phase.quality_gate, &result, &self.checks);
                gate_passed = Some(gate.passed);
                if !gate.passed {
                    let failed = gate.failed_checks().join(", ");
                    warn!(workflow_id = %instance.id, phase = %phase.name, checks = %failed, "Quality gate failed");
                    if strict {
                        instance
                            .errors
                            .push(format!("quality gate failed for phase '{}': {}", phase.name, failed));
                    } else {
                        instance
                            .warnings
                            .push(format!("quality gate failed for phase '{}': {}", phase.name, failed));
                    }
                }
                instance.gate_results.insert(phase.name.clone(), gate);
            }
            instance.completed_phases.push(phase.name.clone());
        } else {
            let reasons = result.errors().join("; ");
            instance
                .errors
                .push(format!("phase '{}' failed: {}", phase.name, reasons));
            if !phase.required {
                instance
                    .warnings
                    .push(format!("optional phase '{}' failed", phase.name));
            }
            instance.failed_phases.push(phase.name.clone());
        }

        info!(
            workflow_id = %instance.id,
            phase = %phase.name,
            success,
            duration_ms = result.duration_ms,
            "Phase finished"
        );
        instance.phase_results.insert(phase.name.clone(), result);
        self.hooks
            .dispatch(
                HookEvent::new(HookKind::PostPhase, instance.id, instance.template.clone())
                    .with_phase(phase.name.clone())
                    .with_payload(json!({ "success": success, "gate_passed": gate_passed })),
            )
            .await;

        if strict && !success {
            return Err(WorkflowError::PhaseFailed {
                phase: phase.name.clone(),
                instance: Box::new(instance.clone()),
            });
        }
        if strict && gate_passed == Some(false) {
            return Err(WorkflowError::QualityGate {
                phase: phase.name.clone(),
                instance: Box::new(instance.clone()),
            });
        }
        Ok(())
    }

    fn terminal_status(&self, template: &WorkflowTemplate, instance: &mut WorkflowInstance) -> WorkflowStatus {
        for phase in &template.phases {
            if !instance.is_settled(&phase.name) {
                instance
                    .errors
                    .push(format!("phase '{}' never reached a terminal state", phase.name));
            }
        }

        if instance.completed_phases.is_empty() && !template.phases.is_empty() {
            return WorkflowStatus::Failed;
        }
        let required_missed = template
            .phases
            .iter()
            .filter(|p| p.required)
            .any(|p| !instance.completed_phases.contains(&p.name));
        if required_missed {
            WorkflowStatus::CompletedWithFailures
        } else {
            WorkflowStatus::Completed
        }
    }

    async fn finish(&self, instance: &mut WorkflowInstance, status: WorkflowStatus) {
        instance.status = status;
        instance.current_phase = None;
        instance.finished_at = Some(now());
        if self.sync(instance).await {
            return;
        }
        info!(
            workflow_id = %instance.id,
            status = %status,
            completed = instance.completed_phases.len(),
            failed = instance.failed_phases.len(),
            skipped = instance.skipped_phases.len(),
            "Workflow finished"
        );
        self.hooks
            .dispatch(
                HookEvent::new(HookKind::PostWorkflow, instance.id, instance.template.clone())
                    .with_payload(json!({ "status": status })),
            )
            .await;
    }

    /// Write the executor's copy back; returns true if the workflow was abandoned
    async fn sync(&self, instance: &mut WorkflowInstance) -> bool {
        let mut instances = self.instances.write().await;
        match instances.get_mut(&instance.id) {
            Some(stored) if stored.abandoned => true,
            Some(stored) => {
                *stored = instance.clone();
                false
            }
            None => {
                instances.insert(instance.id, instance.clone());
                false
            }
        }
    }

    async fn is_abandoned(&self, id: WorkflowId) -> bool {
        self.instances
            .read()
            .await
            .get(&id)
            .is_some_and(|i| i.abandoned)
    }

    async fn abandoned(&self, id: WorkflowId) -> WorkflowError {
        match self.instance(id).await {
            Some(instance) => WorkflowError::Abandoned {
                instance: Box::new(instance),
            },
            None => WorkflowError::NotFound(id),
        }
    }

    async fn run_phase(&self, scope: &RunScope<'_>, phase: &PhaseSpec) -> PhaseResult {
        let started = Instant::now();
        info!(workflow_id = %scope.id, phase = %phase.name, roles = phase.roles.len(), "Starting phase");
        self.hooks
            .dispatch(
                HookEvent::new(HookKind::PrePhase, scope.id, scope.template.name.clone())
                    .with_phase(phase.name.clone())
                    .with_payload(json!({ "roles": phase.roles })),
            )
            .await;

        let prior: IndexMap<String, PhaseResult> = phase
            .depends_on
            .iter()
            .filter_map(|d| scope.prior.get(d).map(|r| (d.clone(), r.clone())))
            .collect();
        let roles = join_all(phase.roles.iter().enumerate().map(|(index, role)| {
            let repeat = phase.roles[..index].iter().filter(|r| *r == role).count();
            self.run_role(scope, phase, role, repeat, &prior)
        }))
        .await;

        let success = if roles.is_empty() {
            true
        } else if scope.options.strict_mode {
            roles.iter().all(|r| r.success)
        } else {
            roles.iter().any(|r| r.success)
        };
        PhaseResult {
            phase: phase.name.clone(),
            success,
            roles,
            duration_ms: elapsed_ms(started),
        }
    }

    async fn run_role(
        &self,
        scope: &RunScope<'_>,
        phase: &PhaseSpec,
        role: &str,
        repeat: usize,
        prior: &IndexMap<String, PhaseResult>,
    ) -> RoleResult {
        let started = Instant::now();
        // Repeated roles in one phase need distinct live task ids
        let task_id = if repeat == 0 {
            TaskId::unchecked(format!("{}:{}:{}", scope.id, phase.name, role))
        } else {
            TaskId::unchecked(format!("{}:{}:{}#{}", scope.id, phase.name, role, repeat + 1))
        };
        let payload = json!({
            "workflow": scope.template.name,
            "phase": phase.name,
            "role": role,
            "task": scope.task_definition,
        });
        let task = Task::new(task_id.as_str(), payload.clone())
            .with_type(role)
            .with_priority(scope.options.priority);

        let decision = match self.router.route(&task).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(workflow_id = %scope.id, phase = %phase.name, role, error = %e, "Role could not be routed");
                return RoleResult {
                    role: role.to_string(),
                    task_id,
                    worker_type: None,
                    success: false,
                    output: None,
                    error: Some(e.to_string()),
                    duration_ms: elapsed_ms(started),
                };
            }
        };
        if let Err(e) = self.router.mark_active(&task_id).await {
            warn!(task_id = %task_id, error = %e, "Could not mark role task active");
        }

        let context = WorkerContext {
            workflow_id: Some(scope.id),
            phase: Some(phase.name.clone()),
            role: Some(role.to_string()),
            requirements: decision.requirements.clone(),
            prior_results: prior.clone(),
            timeout_ms: decision.timeout_ms,
        };
        let invoked = Instant::now();
        let result = match tokio::time::timeout(
            decision.timeout(),
            self.executor
                .invoke(&decision.selected_worker, &payload, &context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout(decision.timeout_ms)),
        };
        let response_ms = elapsed_ms(invoked);

        let outcome = match &result {
            Ok(_) => TaskOutcome::succeeded(response_ms),
            Err(e) => TaskOutcome::failed(response_ms, e.to_failure()),
        };
        if let Err(e) = self.router.mark_complete(&task_id, &outcome).await {
            warn!(task_id = %task_id, error = %e, "Could not record role outcome");
        }

        let (output, error) = match result {
            Ok(output) => (Some(output), None),
            Err(e) => {
                debug!(task_id = %task_id, worker = %decision.selected_worker, error = %e, "Role failed");
                (None, Some(e.to_string()))
            }
        };
        RoleResult {
            role: role.to_string(),
            task_id,
            worker_type: Some(decision.selected_worker.clone()),
            success: error.is_none(),
            output,
            error,
            duration_ms: elapsed_ms(started),
        }
    }
}

impl std::fmt::Debug for WorkflowCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCoordinator")
            .field("templates", &self.templates.names())
            .field("checks", &self.checks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
