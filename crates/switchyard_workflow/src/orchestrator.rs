//! Orchestration root.
//!
//! Owns the configuration and every component built from it. Nothing here is
//! global: hosts construct an [`Orchestrator`] explicitly and pass it around.

use crate::config::OrchestratorConfig;
use crate::coordinator::WorkflowCoordinator;
use crate::error::WorkflowError;
use crate::gate::CheckRegistry;
use crate::hooks::HookDispatcher;
use crate::instance::{WorkflowOptions, WorkflowResult};
use crate::worker::{ChannelWorker, WorkerContext, WorkerError, WorkerExecutor, WorkerOutput};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use switchyard_backend::{Backend, BackendManager, HealthCheckHandle};
use switchyard_core::{Task, TaskOutcome, WorkflowId, elapsed_ms};
use switchyard_router::{RouterStatistics, RoutingDecision, TaskRouter};
use tracing::{info, warn};

/// Result of a standalone task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    /// How the task was routed
    pub decision: Arc<RoutingDecision>,
    /// Whether the worker succeeded
    pub success: bool,
    /// Worker output on success
    pub output: Option<WorkerOutput>,
    /// Error message on failure
    pub error: Option<String>,
    /// Worker response time in milliseconds
    pub response_time_ms: u64,
}

/// Owner of the router, backend manager and workflow coordinator
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    router: Arc<TaskRouter>,
    backend: Arc<BackendManager>,
    executor: Arc<dyn WorkerExecutor>,
    coordinator: WorkflowCoordinator,
}

impl Orchestrator {
    /// Build every component from a validated configuration
    ///
    /// `channels` supplies one backend per configured channel, by name.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the configuration, or `Config` when
    /// the supplied backends do not match the configured channels.
    pub async fn new(
        config: OrchestratorConfig,
        executor: Arc<dyn WorkerExecutor>,
        channels: IndexMap<String, Arc<dyn Backend>>,
    ) -> Result<Self, WorkflowError> {
        Self::assemble(config, channels, |_| executor).await
    }

    /// Build an orchestrator whose workers run over the backend channels
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::new`]
    pub async fn with_channel_worker(
        config: OrchestratorConfig,
        channels: IndexMap<String, Arc<dyn Backend>>,
    ) -> Result<Self, WorkflowError> {
        Self::assemble(config, channels, |backend| {
            let worker: Arc<dyn WorkerExecutor> = Arc::new(ChannelWorker::new(Arc::clone(backend)));
            worker
        })
        .await
    }

    async fn assemble<F>(
        config: OrchestratorConfig,
        mut channels: IndexMap<String, Arc<dyn Backend>>,
        executor: F,
    ) -> Result<Self, WorkflowError>
    where
        F: FnOnce(&Arc<BackendManager>) -> Arc<dyn WorkerExecutor>,
    {
        config.validate()?;
        let config = Arc::new(config);

        let backend = Arc::new(BackendManager::new(config.backend));
        for spec in &config.channels {
            let implementation = channels.shift_remove(&spec.name).ok_or_else(|| {
                WorkflowError::Config(format!("no backend supplied for channel '{}'", spec.name))
            })?;
            backend
                .register_channel(spec.clone(), implementation)
                .await
                .map_err(|e| WorkflowError::Config(e.to_string()))?;
        }
        if let Some(extra) = channels.keys().next() {
            return Err(WorkflowError::Config(format!(
                "backend '{}' has no channel configuration",
                extra
            )));
        }

        let registry = Arc::new(config.build_registry()?);
        let router = Arc::new(
            TaskRouter::new(registry, config.routing).with_rules(config.build_rules()),
        );
        let executor = executor(&backend);
        let hooks = Arc::new(
            HookDispatcher::new()
                .with_backend(Arc::clone(&backend))
                .with_timeout(config.workflow.hook_timeout),
        );
        let coordinator = WorkflowCoordinator::new(Arc::clone(&router), Arc::clone(&executor))
            .with_templates(config.build_templates())
            .with_hooks(hooks)
            .with_config(config.workflow);

        info!(
            workers = router.registry().len(),
            channels = config.channels.len(),
            templates = coordinator.templates().len(),
            strategy = %router.strategy(),
            "Orchestrator ready"
        );
        Ok(Self {
            config,
            router,
            backend,
            executor,
            coordinator,
        })
    }

    /// Register host quality checks
    #[must_use]
    pub fn with_checks(mut self, checks: CheckRegistry) -> Self {
        self.coordinator = self.coordinator.with_checks(checks);
        self
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &Arc<OrchestratorConfig> {
        &self.config
    }

    /// Task router
    #[must_use]
    pub fn router(&self) -> &Arc<TaskRouter> {
        &self.router
    }

    /// Backend manager
    #[must_use]
    pub fn backend(&self) -> &Arc<BackendManager> {
        &self.backend
    }

    /// Workflow coordinator
    #[must_use]
    pub fn coordinator(&self) -> &WorkflowCoordinator {
        &self.coordinator
    }

    /// Route a task, run it on the selected worker and record the outcome
    ///
    /// Worker failures are reported in the [`TaskReport`], not as errors.
    ///
    /// # Errors
    ///
    /// Returns `Router` when the task is invalid or no worker type fits
    pub async fn submit_task(&self, task: Task) -> Result<TaskReport, WorkflowError> {
        let decision = self.router.route(&task).await?;
        self.router.mark_active(&task.id).await?;

        let payload = task.payload.clone().unwrap_or(Value::Null);
        let context = WorkerContext::standalone(decision.requirements.clone(), decision.timeout_ms);
        let started = Instant::now();
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
        let response_time_ms = elapsed_ms(started);

        let outcome = match &result {
            Ok(_) => TaskOutcome::succeeded(response_time_ms),
            Err(e) => TaskOutcome::failed(response_time_ms, e.to_failure()),
        };
        self.router.mark_complete(&task.id, &outcome).await?;

        let (output, error) = match result {
            Ok(output) => (Some(output), None),
            Err(e) => {
                warn!(task_id = %task.id, worker = %decision.selected_worker, error = %e, "Task failed");
                (None, Some(e.to_string()))
            }
        };
        Ok(TaskReport {
            success: error.is_none(),
            decision,
            output,
            error,
            response_time_ms,
        })
    }

    /// Create a workflow instance
    ///
    /// # Errors
    ///
    /// See [`WorkflowCoordinator::create_workflow`]
    pub async fn create_workflow(
        &self,
        template: &str,
        task_definition: Value,
        options: Option<WorkflowOptions>,
    ) -> Result<WorkflowId, WorkflowError> {
        self.coordinator
            .create_workflow(template, task_definition, options)
            .await
    }

    /// Execute a created workflow
    ///
    /// # Errors
    ///
    /// See [`WorkflowCoordinator::execute_workflow`]
    pub async fn execute_workflow(&self, id: WorkflowId) -> Result<WorkflowResult, WorkflowError> {
        self.coordinator.execute_workflow(id).await
    }

    /// Create and execute a workflow
    ///
    /// # Errors
    ///
    /// Any error of creation or execution
    pub async fn run_workflow(
        &self,
        template: &str,
        task_definition: Value,
        options: Option<WorkflowOptions>,
    ) -> Result<WorkflowResult, WorkflowError> {
        let id = self.create_workflow(template, task_definition, options).await?;
        self.execute_workflow(id).await
    }

    /// Abandon a workflow
    ///
    /// # Errors
    ///
    /// See [`WorkflowCoordinator::abandon_workflow`]
    pub async fn abandon_workflow(&self, id: WorkflowId) -> Result<(), WorkflowError> {
        self.coordinator.abandon_workflow(id).await
    }

    /// Start periodic channel health probes
    pub async fn start_health_checks(&self) -> HealthCheckHandle {
        self.backend.start_health_checks().await
    }

    /// Router statistics
    pub async fn statistics(&self) -> RouterStatistics {
        self.router.statistics().await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
