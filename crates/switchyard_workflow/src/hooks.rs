//! Lifecycle hooks.
//!
//! Hooks are best effort. Every event goes to registered sinks, to
//! broadcast subscribers and, when some healthy channel carries the
//! `workflow-coordination` capability, through the backend manager. Each
//! delivery is bounded by the dispatcher timeout. A failing or stalled
//! destination is logged and never holds up the workflow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use switchyard_backend::{BackendManager, ExecuteOptions};
use switchyard_core::{Timestamp, WorkflowId, now};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

/// Capability used to carry hook events over a backend channel
pub const HOOK_CAPABILITY: &str = "workflow-coordination";

const BROADCAST_CAPACITY: usize = 1000;

/// Default bound on a single hook delivery
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookKind {
    /// Before the first phase
    PreWorkflow,
    /// Before a phase
    PrePhase,
    /// After a phase and its gate
    PostPhase,
    /// After the terminal status is set
    PostWorkflow,
}

impl HookKind {
    /// Kebab-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreWorkflow => "pre-workflow",
            Self::PrePhase => "pre-phase",
            Self::PostPhase => "post-phase",
            Self::PostWorkflow => "post-workflow",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    /// Lifecycle point
    pub kind: HookKind,
    /// Workflow the event belongs to
    pub workflow_id: WorkflowId,
    /// Template name
    pub template: String,
    /// Phase, for phase events
    pub phase: Option<String>,
    /// Event details
    pub payload: Value,
    /// Emission time
    pub timestamp: Timestamp,
}

impl HookEvent {
    /// Create an event stamped now
    #[must_use]
    pub fn new(kind: HookKind, workflow_id: WorkflowId, template: impl Into<String>) -> Self {
        Self {
            kind,
            workflow_id,
            template: template.into(),
            phase: None,
            payload: Value::Null,
            timestamp: now(),
        }
    }

    /// Attach the phase
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Attach details
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Host listener for lifecycle events
#[async_trait]
pub trait HookSink: Send + Sync {
    /// Receive an event; errors are logged and otherwise ignored
    async fn notify(&self, event: &HookEvent) -> Result<(), String>;
}

/// Fans lifecycle events out to sinks, subscribers and the backend
pub struct HookDispatcher {
    sinks: RwLock<Vec<Arc<dyn HookSink>>>,
    sender: broadcast::Sender<HookEvent>,
    backend: Option<Arc<BackendManager>>,
    timeout: Duration,
}

impl HookDispatcher {
    /// Dispatcher without a backend
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            sinks: RwLock::new(Vec::new()),
            sender,
            backend: None,
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    /// Bound each sink notification and backend delivery
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Also send events through a backend manager
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<BackendManager>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Register a sink
    pub async fn register(&self, sink: Arc<dyn HookSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Subscribe to every future event
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HookEvent> {
        self.sender.subscribe()
    }

    /// Deliver an event everywhere, swallowing failures
    pub async fn dispatch(&self, event: HookEvent) {
        debug!(
            workflow_id = %event.workflow_id,
            hook = %event.kind,
            phase = event.phase.as_deref().unwrap_or(""),
            "Dispatching hook"
        );

        let sinks: Vec<Arc<dyn HookSink>> = self.sinks.read().await.clone();
        for sink in sinks {
            match tokio::time::timeout(self.timeout, sink.notify(&event)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(workflow_id = %event.workflow_id, hook = %event.kind, error = %e, "Hook sink failed");
                }
                Err(_) => {
                    warn!(
                        workflow_id = %event.workflow_id,
                        hook = %event.kind,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Hook sink timed out"
                    );
                }
            }
        }

        if let Some(backend) = &self.backend {
            if backend.has_capability(HOOK_CAPABILITY).await {
                let parameters = match serde_json::to_value(&event) {
                    Ok(parameters) => parameters,
                    Err(e) => {
                        warn!(hook = %event.kind, error = %e, "Hook event not serializable");
                        Value::Null
                    }
                };
                let operation = format!("hook.{}", event.kind);
                let options = ExecuteOptions::default().with_failover(false);
                let delivery = backend.execute_tool_call(HOOK_CAPABILITY, &operation, &parameters, &options);
                match tokio::time::timeout(self.timeout, delivery).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        warn!(workflow_id = %event.workflow_id, hook = %event.kind, error = %e, "Hook delivery failed");
                    }
                    Err(_) => {
                        warn!(workflow_id = %event.workflow_id, hook = %event.kind, "Hook delivery timed out");
                    }
                }
            }
        }

        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

impl Default for HookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("subscribers", &self.sender.receiver_count())
            .field("backend", &self.backend.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use switchyard_backend::{Backend, BackendConfig, ChannelFailure, ChannelSpec, HealthStatus};
    use switchyard_core::CapabilitySet;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HookKind>>,
        fail: bool,
    }

    #[async_trait]
    impl HookSink for Recorder {
        async fn notify(&self, event: &HookEvent) -> Result<(), String> {
            self.seen.lock().unwrap().push(event.kind);
            if self.fail {
                Err("sink offline".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct HookChannel {
        operations: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Backend for HookChannel {
        async fn execute(&self, operation: &str, _parameters: &Value) -> Result<Value, ChannelFailure> {
            self.operations.lock().unwrap().push(operation.to_string());
            Err(ChannelFailure::new("hook endpoint down"))
        }

        async fn probe(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_stop_others() {
        let dispatcher = HookDispatcher::new();
        let failing = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let ok = Arc::new(Recorder::default());
        dispatcher.register(failing.clone()).await;
        dispatcher.register(ok.clone()).await;
        let mut rx = dispatcher.subscribe();

        let id = WorkflowId::new();
        dispatcher
            .dispatch(HookEvent::new(HookKind::PrePhase, id, "bug-fix").with_phase("fix"))
            .await;

        assert_eq!(*failing.seen.lock().unwrap(), vec![HookKind::PrePhase]);
        assert_eq!(*ok.seen.lock().unwrap(), vec![HookKind::PrePhase]);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.workflow_id, id);
        assert_eq!(event.phase.as_deref(), Some("fix"));
    }

    #[tokio::test]
    async fn test_backend_delivery_is_best_effort() {
        let channel = Arc::new(HookChannel::default());
        let manager = BackendManager::new(BackendConfig::default());
        manager
            .register_channel(
                ChannelSpec::new("hooks", CapabilitySet::from_tags([HOOK_CAPABILITY]).unwrap())
                    .with_retry_count(0),
                channel.clone(),
            )
            .await
            .unwrap();
        let dispatcher = HookDispatcher::new().with_backend(Arc::new(manager));

        dispatcher
            .dispatch(
                HookEvent::new(HookKind::PostWorkflow, WorkflowId::new(), "bug-fix")
                    .with_payload(json!({"status": "completed"})),
            )
            .await;

        assert_eq!(*channel.operations.lock().unwrap(), vec!["hook.post-workflow".to_string()]);
    }

    #[tokio::test]
    async fn test_backend_without_capability_is_skipped() {
        let channel = Arc::new(HookChannel::default());
        let manager = BackendManager::new(BackendConfig::default());
        manager
            .register_channel(
                ChannelSpec::new("fs", CapabilitySet::from_tags(["filesystem"]).unwrap()),
                channel.clone(),
            )
            .await
            .unwrap();
        let dispatcher = HookDispatcher::new().with_backend(Arc::new(manager));
        dispatcher
            .dispatch(HookEvent::new(HookKind::PreWorkflow, WorkflowId::new(), "docs"))
            .await;
        assert!(channel.operations.lock().unwrap().is_empty());
    }

    struct StalledSink;

    #[async_trait]
    impl HookSink for StalledSink {
        async fn notify(&self, _event: &HookEvent) -> Result<(), String> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_sink_is_bounded() {
        let dispatcher = HookDispatcher::new().with_timeout(Duration::from_millis(20));
        let after = Arc::new(Recorder::default());
        dispatcher.register(Arc::new(StalledSink)).await;
        dispatcher.register(after.clone()).await;
        let mut rx = dispatcher.subscribe();

        let dispatched = tokio::time::timeout(
            Duration::from_secs(2),
            dispatcher.dispatch(HookEvent::new(HookKind::PreWorkflow, WorkflowId::new(), "docs")),
        )
        .await;
        assert!(dispatched.is_ok());
        assert_eq!(*after.seen.lock().unwrap(), vec![HookKind::PreWorkflow]);
        assert_eq!(rx.recv().await.unwrap().kind, HookKind::PreWorkflow);
    }

    #[test]
    fn test_hook_kind_names() {
        assert_eq!(HookKind::PreWorkflow.to_string(), "pre-workflow");
        assert_eq!(serde_json::to_value(HookKind::PostPhase).unwrap(), json!("post-phase"));
    }
}
