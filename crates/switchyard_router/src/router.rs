//! Task router.
//!
//! One `tokio::sync::RwLock` guards the tracker, the audit history and the
//! task table, so recording a decision and bumping the queued counter happen
//! in a single critical section with respect to other routing calls.

use crate::audit::{AuditConfig, AuditLog};
use crate::decision::RoutingDecision;
use crate::error::RouterError;
use crate::registry::CapabilityRegistry;
use crate::requirements::RequirementRules;
use crate::scoring::CandidateScore;
use crate::strategy::RoutingStrategy;
use crate::tracker::{Tracker, WorkerStats};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_core::{DecisionId, Priority, RequirementProfile, Task, TaskFailure, TaskId, TaskOutcome, now};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Lifecycle state of a routed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Routed, not started
    Queued,
    /// Executing
    Active,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully
    Failed,
}

impl TaskState {
    /// Queued and active tasks hold a live decision
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Queued | Self::Active)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => f.write_str("queued"),
            Self::Active => f.write_str("active"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Default timeout per priority, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityTimeouts {
    /// Critical tasks
    pub critical_ms: u64,
    /// High priority tasks
    pub high_ms: u64,
    /// Medium priority tasks
    pub medium_ms: u64,
    /// Low priority tasks
    pub low_ms: u64,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for PriorityTimeouts {
    fn default() -> Self {
        Self {
            critical_ms: millis(Priority::Critical.default_timeout()),
            high_ms: millis(Priority::High.default_timeout()),
            medium_ms: millis(Priority::Medium.default_timeout()),
            low_ms: millis(Priority::Low.default_timeout()),
        }
    }
}

impl PriorityTimeouts {
    /// Timeout for a priority
    #[must_use]
    pub const fn timeout_ms(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Critical => self.critical_ms,
            Priority::High => self.high_ms,
            Priority::Medium => self.medium_ms,
            Priority::Low => self.low_ms,
        }
    }
}

/// Router configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Selection strategy
    pub strategy: RoutingStrategy,
    /// Priority to timeout table
    pub timeouts: PriorityTimeouts,
    /// Audit retention
    pub audit: AuditConfig,
}

impl RouterConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: RoutingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set priority timeouts
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: PriorityTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set audit retention
    #[must_use]
    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }
}

/// Snapshot of router state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterStatistics {
    /// Active strategy
    pub strategy: RoutingStrategy,
    /// Load and performance per worker type, in registration order
    pub workers: IndexMap<String, WorkerStats>,
    /// Tasks routed since startup
    pub total_routed: u64,
    /// Retained audit entries
    pub history_len: usize,
    /// Queued or active tasks
    pub live_tasks: usize,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    worker_type: String,
    state: TaskState,
    decision_id: DecisionId,
}

struct RouterState {
    tracker: Tracker,
    audit: AuditLog,
    tasks: HashMap<TaskId, TaskRecord>,
    total_routed: u64,
}

impl RouterState {
    /// Drop finished task records whose decision left the history
    ///
    /// Live records are kept; `mark_complete` drops them once they finish.
    fn forget(&mut self, evicted: &[Arc<RoutingDecision>]) {
        for decision in evicted {
            let stale = self
                .tasks
                .get(&decision.task_id)
                .is_some_and(|r| r.decision_id == decision.id && !r.state.is_live());
            if stale {
                self.tasks.remove(&decision.task_id);
            }
        }
    }
}

/// Capability based task router
pub struct TaskRouter {
    registry: Arc<CapabilityRegistry>,
    rules: RequirementRules,
    config: RouterConfig,
    state: RwLock<RouterState>,
}

impl TaskRouter {
    /// Create a router with the built-in requirement rules
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>, config: RouterConfig) -> Self {
        let state = RouterState {
            tracker: Tracker::new(&registry),
            audit: AuditLog::new(config.audit),
            tasks: HashMap::new(),
            total_routed: 0,
        };
        Self {
            registry,
            rules: RequirementRules::builtin(),
            config,
            state: RwLock::new(state),
        }
    }

    /// Replace the requirement rules table
    #[must_use]
    pub fn with_rules(mut self, rules: RequirementRules) -> Self {
        self.rules = rules;
        self
    }

    /// Capability registry
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Active strategy
    #[must_use]
    pub fn strategy(&self) -> RoutingStrategy {
        self.config.strategy
    }

    /// Requirement profile derived for a task
    #[must_use]
    pub fn requirements_for(&self, task: &Task) -> RequirementProfile {
        self.rules.derive(task)
    }

    /// Route a task to a worker type
    ///
    /// # Errors
    ///
    /// Returns `InvalidTask` for a missing id or payload, or when the task
    /// id already has a queued or active decision. Returns
    /// `NoSuitableWorker` when no worker type shares a capability with the
    /// task.
    pub async fn route(&self, task: &Task) -> Result<Arc<RoutingDecision>, RouterError> {
        let started = Instant::now();
        if task.id.is_blank() {
            return Err(RouterError::invalid_task(task.id.as_str(), "task id is missing"));
        }
        if !task.has_payload() {
            return Err(RouterError::invalid_task(task.id.as_str(), "task payload is missing"));
        }

        let requirements = self.rules.derive(task);
        let priority = task.effective_priority();
        let timeout_ms = task
            .timeout_ms
            .unwrap_or_else(|| self.config.timeouts.timeout_ms(priority));

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if let Some(record) = state.tasks.get(&task.id).filter(|r| r.state.is_live()) {
            return Err(RouterError::invalid_task(
                task.id.as_str(),
                format!("task is already {} on {}", record.state, record.worker_type),
            ));
        }

        let idle = WorkerStats::default();
        let mut candidates: Vec<CandidateScore> = self
            .registry
            .iter()
            .map(|profile| {
                let stats = state.tracker.stats(&profile.worker_type).unwrap_or(&idle);
                CandidateScore::evaluate(profile, &requirements, stats)
            })
            .collect();

        let Some(index) = self.config.strategy.select(&mut candidates, priority) else {
            debug!(
                task_id = %task.id,
                capabilities = %requirements.capabilities,
                "No worker type matches task"
            );
            return Err(RouterError::NoSuitableWorker {
                task_id: task.id.to_string(),
                capabilities: requirements.capabilities,
            });
        };

        let selected_worker = candidates[index].worker_type.clone();
        let score = candidates[index].score;
        state.tracker.record_queued(&selected_worker)?;

        let decision = Arc::new(RoutingDecision {
            id: DecisionId::new(),
            task_id: task.id.clone(),
            selected_worker: selected_worker.clone(),
            candidates,
            requirements,
            strategy: self.config.strategy,
            priority,
            timeout_ms,
            routing_latency_us: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            timestamp: now(),
        });

        let evicted = state.audit.record(Arc::clone(&decision));
        state.forget(&evicted);
        state.tasks.insert(
            task.id.clone(),
            TaskRecord {
                worker_type: selected_worker.clone(),
                state: TaskState::Queued,
                decision_id: decision.id,
            },
        );
        state.total_routed += 1;

        info!(
            task_id = %task.id,
            worker = %selected_worker,
            strategy = %self.config.strategy,
            priority = %priority,
            score,
            "Routed task"
        );
        Ok(decision)
    }

    /// Mark a queued task as executing
    ///
    /// # Errors
    ///
    /// Returns error if the task is unknown or not queued
    pub async fn mark_active(&self, task_id: &TaskId) -> Result<(), RouterError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RouterError::UnknownTask(task_id.to_string()))?;
        if record.state != TaskState::Queued {
            return Err(RouterError::InvalidTransition {
                task_id: task_id.to_string(),
                state: record.state,
            });
        }
        state.tracker.record_started(&record.worker_type)?;
        record.state = TaskState::Active;
        debug!(task_id = %task_id, worker = %record.worker_type, "Task active");
        Ok(())
    }

    /// Record the outcome of a routed task and feed it back to the tracker
    ///
    /// A task that was never marked active is started implicitly.
    ///
    /// # Errors
    ///
    /// Returns error if the task is unknown or already finished
    pub async fn mark_complete(
        &self,
        task_id: &TaskId,
        outcome: &TaskOutcome,
    ) -> Result<(), RouterError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| RouterError::UnknownTask(task_id.to_string()))?;
        match record.state {
            TaskState::Queued => state.tracker.record_started(&record.worker_type)?,
            TaskState::Active => {}
            finished => {
                return Err(RouterError::InvalidTransition {
                    task_id: task_id.to_string(),
                    state: finished,
                });
            }
        }
        state.tracker.update_performance(
            &record.worker_type,
            outcome.success,
            outcome.response_time_ms,
            outcome.failure.as_ref(),
        )?;
        record.state = if outcome.success {
            TaskState::Completed
        } else {
            TaskState::Failed
        };
        debug!(
            task_id = %task_id,
            worker = %record.worker_type,
            success = outcome.success,
            response_time_ms = outcome.response_time_ms,
            "Task finished"
        );
        // Decision was evicted while the task was live; nothing will forget it later
        if !state.audit.contains_task(task_id) {
            state.tasks.remove(task_id);
        }
        Ok(())
    }

    /// Feed a finished task straight into the tracker
    ///
    /// # Errors
    ///
    /// Returns error if the worker type is unknown
    pub async fn update_performance(
        &self,
        worker_type: &str,
        success: bool,
        response_time_ms: u64,
        error: Option<&TaskFailure>,
    ) -> Result<(), RouterError> {
        let mut state = self.state.write().await;
        state
            .tracker
            .update_performance(worker_type, success, response_time_ms, error)?;
        Ok(())
    }

    /// Current lifecycle state of a task
    pub async fn task_state(&self, task_id: &TaskId) -> Option<TaskState> {
        self.state.read().await.tasks.get(task_id).map(|r| r.state)
    }

    /// Snapshot of load, performance and routing counters
    pub async fn statistics(&self) -> RouterStatistics {
        let state = self.state.read().await;
        RouterStatistics {
            strategy: self.config.strategy,
            workers: state.tracker.snapshot(),
            total_routed: state.total_routed,
            history_len: state.audit.len(),
            live_tasks: state.tasks.values().filter(|r| r.state.is_live()).count(),
        }
    }

    /// Retained decisions, oldest first
    pub async fn history(&self) -> Vec<Arc<RoutingDecision>> {
        self.state.read().await.audit.entries()
    }

    /// Latest retained decision for a task
    pub async fn decision(&self, task_id: &TaskId) -> Option<Arc<RoutingDecision>> {
        self.state.read().await.audit.find(task_id)
    }

    /// Evict expired decisions; returns how many were dropped
    pub async fn prune_history(&self) -> usize {
        let mut state = self.state.write().await;
        let evicted = state.audit.prune();
        state.forget(&evicted);
        evicted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CapabilityProfile;
    use serde_json::{Value, json};
    use switchyard_core::{CapabilitySet, Complexity};

    fn caps(tags: &[&str]) -> CapabilitySet {
        CapabilitySet::from_tags(tags).unwrap()
    }

    fn registry() -> Arc<CapabilityRegistry> {
        Arc::new(
            CapabilityRegistry::new([
                CapabilityProfile::new("backend-developer", caps(&["api-development", "database"]))
                    .with_complexity(Complexity::Medium),
                CapabilityProfile::new("tester", caps(&["testing"]))
                    .with_complexity(Complexity::Low)
                    .with_channels(["filesystem"]),
                CapabilityProfile::new("writer", caps(&["documentation"]))
                    .with_complexity(Complexity::Low),
            ])
            .unwrap(),
        )
    }

    fn router(strategy: RoutingStrategy) -> TaskRouter {
        TaskRouter::new(registry(), RouterConfig::new().with_strategy(strategy))
    }

    fn id(raw: &str) -> TaskId {
        TaskId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_route_by_type() {
        let router = router(RoutingStrategy::Adaptive);
        let task = Task::new("t-1", json!({"suite": "unit"})).with_type("testing");
        let decision = router.route(&task).await.unwrap();
        assert_eq!(decision.selected_worker, "tester");
        assert_eq!(decision.strategy, RoutingStrategy::Adaptive);
        assert_eq!(decision.candidates.len(), 3);
        assert_eq!(router.task_state(&task.id).await, Some(TaskState::Queued));

        let stats = router.statistics().await;
        assert_eq!(stats.workers["tester"].load.queued, 1);
        assert_eq!(stats.total_routed, 1);
        assert_eq!(stats.live_tasks, 1);
    }

    #[tokio::test]
    async fn test_route_by_payload_inference() {
        let router = router(RoutingStrategy::Simple);
        let task = Task::new("t-1", json!({"description": "Add a REST endpoint"}));
        let decision = router.route(&task).await.unwrap();
        assert_eq!(decision.selected_worker, "backend-developer");
        assert!(decision.requirements.capabilities.contains_tag("api-development"));
    }

    #[tokio::test]
    async fn test_no_suitable_worker() {
        let router = router(RoutingStrategy::Adaptive);
        let task = Task::new("t-1", json!({"job": "deploy"})).with_type("deployment");
        let err = router.route(&task).await.unwrap_err();
        assert!(matches!(err, RouterError::NoSuitableWorker { .. }));

        let stats = router.statistics().await;
        assert_eq!(stats.total_routed, 0);
        assert!(stats.workers.values().all(|w| w.load.queued == 0));
        assert!(router.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_tasks() {
        let router = router(RoutingStrategy::Adaptive);
        let blank = Task::new("  ", json!({"a": "b"}));
        assert!(matches!(router.route(&blank).await, Err(RouterError::InvalidTask { .. })));

        let no_payload = Task::new("t-1", Value::Null);
        assert!(matches!(router.route(&no_payload).await, Err(RouterError::InvalidTask { .. })));

        let mut missing = Task::new("t-2", json!({}));
        missing.payload = None;
        assert!(matches!(router.route(&missing).await, Err(RouterError::InvalidTask { .. })));
    }

    #[tokio::test]
    async fn test_live_task_cannot_be_rerouted() {
        let router = router(RoutingStrategy::Adaptive);
        let task = Task::new("t-1", json!({"x": "docs"})).with_type("documentation");
        router.route(&task).await.unwrap();
        assert!(matches!(router.route(&task).await, Err(RouterError::InvalidTask { .. })));

        router.mark_active(&task.id).await.unwrap();
        assert!(router.route(&task).await.is_err());

        router.mark_complete(&task.id, &TaskOutcome::succeeded(100)).await.unwrap();
        assert!(router.route(&task).await.is_ok());
        assert_eq!(router.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_updates_tracker() {
        let router = router(RoutingStrategy::Adaptive);
        let task = Task::new("t-1", json!({"suite": "unit"})).with_type("testing");
        router.route(&task).await.unwrap();
        router.mark_active(&task.id).await.unwrap();

        let stats = router.statistics().await;
        assert_eq!(stats.workers["tester"].load.active, 1);
        assert_eq!(stats.workers["tester"].load.queued, 0);

        let outcome = TaskOutcome::failed(400, TaskFailure::timeout("too slow"));
        router.mark_complete(&task.id, &outcome).await.unwrap();
        assert_eq!(router.task_state(&task.id).await, Some(TaskState::Failed));

        let tester = &router.statistics().await.workers["tester"];
        assert_eq!(tester.load.active, 0);
        assert_eq!(tester.performance.failed_tasks, 1);
        assert_eq!(tester.performance.timeout_count, 1);
        assert_eq!(tester.performance.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let router = router(RoutingStrategy::Adaptive);
        assert!(matches!(
            router.mark_active(&id("ghost")).await,
            Err(RouterError::UnknownTask(_))
        ));

        let task = Task::new("t-1", json!({"suite": "unit"})).with_type("testing");
        router.route(&task).await.unwrap();
        router.mark_complete(&task.id, &TaskOutcome::succeeded(10)).await.unwrap();
        assert!(matches!(
            router.mark_complete(&task.id, &TaskOutcome::succeeded(10)).await,
            Err(RouterError::InvalidTransition { state: TaskState::Completed, .. })
        ));
        assert!(matches!(
            router.mark_active(&task.id).await,
            Err(RouterError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_api_worker_selected_by_every_strategy() {
        for strategy in RoutingStrategy::ALL {
            let router = router(strategy);
            for (n, priority) in [Priority::Low, Priority::Medium, Priority::High, Priority::Critical]
                .into_iter()
                .enumerate()
            {
                let task = Task::new(format!("t-{n}"), json!({"spec": "orders"}))
                    .with_type("api-development")
                    .with_priority(priority);
                let decision = router.route(&task).await.unwrap();
                assert_eq!(decision.selected_worker, "backend-developer", "{strategy}");
            }
        }
    }

    #[tokio::test]
    async fn test_load_shifts_selection() {
        let registry = Arc::new(
            CapabilityRegistry::new([
                CapabilityProfile::new("beta", caps(&["testing"])).with_concurrency_limit(1),
                CapabilityProfile::new("alpha", caps(&["testing"])).with_concurrency_limit(1),
            ])
            .unwrap(),
        );
        let router = TaskRouter::new(registry, RouterConfig::new().with_strategy(RoutingStrategy::Simple));

        let first = Task::new("t-1", json!({"suite": "unit"})).with_type("testing");
        assert_eq!(router.route(&first).await.unwrap().selected_worker, "alpha");
        router.mark_active(&first.id).await.unwrap();

        let second = Task::new("t-2", json!({"suite": "unit"})).with_type("testing");
        assert_eq!(router.route(&second).await.unwrap().selected_worker, "beta");
    }

    #[tokio::test]
    async fn test_timeout_resolution() {
        let router = TaskRouter::new(
            registry(),
            RouterConfig::new().with_timeouts(PriorityTimeouts {
                critical_ms: 1_000,
                ..PriorityTimeouts::default()
            }),
        );
        let critical = Task::new("t-1", json!({"a": "test"}))
            .with_type("testing")
            .with_priority(Priority::Critical);
        assert_eq!(router.route(&critical).await.unwrap().timeout_ms, 1_000);

        let medium = Task::new("t-2", json!({"a": "test"})).with_type("testing");
        let decision = router.route(&medium).await.unwrap();
        assert_eq!(decision.priority, Priority::Medium);
        assert_eq!(decision.timeout(), Duration::from_secs(300));

        let explicit = Task::new("t-3", json!({"a": "test"}))
            .with_type("testing")
            .with_timeout(Duration::from_millis(2_500));
        assert_eq!(router.route(&explicit).await.unwrap().timeout_ms, 2_500);
    }

    #[tokio::test]
    async fn test_decision_round_trips_through_history() {
        let router = router(RoutingStrategy::Adaptive);
        let task = Task::new("t-1", json!({"suite": "unit"})).with_type("testing");
        let decision = router.route(&task).await.unwrap();

        let from_history = router.decision(&task.id).await.unwrap();
        assert_eq!(*from_history, *decision);
        assert_eq!(router.history().await[0].id, decision.id);

        let json = serde_json::to_string(&*from_history).unwrap();
        let back: RoutingDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, decision.id);
        assert_eq!(back.selected_worker, decision.selected_worker);
        assert_eq!(back.requirements, decision.requirements);
    }

    #[tokio::test]
    async fn test_history_bounded() {
        let router = TaskRouter::new(
            registry(),
            RouterConfig::new().with_audit(AuditConfig::default().with_max_entries(2)),
        );
        for n in 0..4 {
            let task = Task::new(format!("t-{n}"), json!({"suite": "unit"})).with_type("testing");
            router.route(&task).await.unwrap();
            router.mark_complete(&task.id, &TaskOutcome::succeeded(5)).await.unwrap();
        }
        let history = router.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].task_id.as_str(), "t-2");
        assert!(router.decision(&id("t-0")).await.is_none());
        assert_eq!(router.task_state(&id("t-0")).await, None);
        assert_eq!(router.prune_history().await, 0);
    }

    #[tokio::test]
    async fn test_live_task_outlives_its_history_entry() {
        let router = TaskRouter::new(
            registry(),
            RouterConfig::new().with_audit(AuditConfig::default().with_max_entries(1)),
        );
        let first = Task::new("t-0", json!({"suite": "unit"})).with_type("testing");
        let second = Task::new("t-1", json!({"suite": "unit"})).with_type("testing");
        router.route(&first).await.unwrap();
        router.route(&second).await.unwrap();

        assert!(router.decision(&first.id).await.is_none());
        assert_eq!(router.task_state(&first.id).await, Some(TaskState::Queued));

        router.mark_complete(&first.id, &TaskOutcome::succeeded(5)).await.unwrap();
        assert_eq!(router.task_state(&first.id).await, None);
        assert_eq!(router.statistics().await.live_tasks, 1);

        router.mark_complete(&second.id, &TaskOutcome::succeeded(5)).await.unwrap();
        assert_eq!(router.task_state(&second.id).await, Some(TaskState::Completed));
    }

    #[tokio::test]
    async fn test_concurrent_routing_counts() {
        let router = Arc::new(router(RoutingStrategy::LoadBalanced));
        let handles: Vec<_> = (0..20)
            .map(|n| {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let task = Task::new(format!("t-{n}"), json!({"suite": "unit"})).with_type("testing");
                    router.route(&task).await
                })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }
        let stats = router.statistics().await;
        assert_eq!(stats.workers["tester"].load.queued, 20);
        assert_eq!(stats.history_len, 20);
    }

    #[tokio::test]
    async fn test_update_performance_unknown_worker() {
        let router = router(RoutingStrategy::Adaptive);
        assert!(router.update_performance("designer", true, 1, None).await.is_err());
        router.update_performance("writer", true, 50, None).await.unwrap();
        assert_eq!(router.statistics().await.workers["writer"].performance.total_tasks, 1);
    }
}
