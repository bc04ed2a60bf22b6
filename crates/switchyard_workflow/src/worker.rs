//! Worker execution contract.
//!
//! The host supplies a [`WorkerExecutor`] that actually performs role work.
//! [`ChannelWorker`] is a ready-made executor that forwards each invocation
//! to the backend manager.

use crate::instance::PhaseResult;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use switchyard_backend::{BackendError, BackendManager, ExecuteOptions};
use switchyard_core::{RequirementProfile, TaskFailure, WorkflowId};

/// What a worker is told about the work it is doing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerContext {
    /// Owning workflow, if any
    pub workflow_id: Option<WorkflowId>,
    /// Phase name, if any
    pub phase: Option<String>,
    /// Role name within the phase, if any
    pub role: Option<String>,
    /// Requirements the router derived
    pub requirements: RequirementProfile,
    /// Results of the phases this one depends on
    #[serde(default)]
    pub prior_results: IndexMap<String, PhaseResult>,
    /// Time budget in milliseconds
    pub timeout_ms: u64,
}

impl WorkerContext {
    /// Context for a task outside any workflow
    #[must_use]
    pub fn standalone(requirements: RequirementProfile, timeout_ms: u64) -> Self {
        Self {
            workflow_id: None,
            phase: None,
            role: None,
            requirements,
            prior_results: IndexMap::new(),
            timeout_ms,
        }
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutput {
    /// Returned data
    #[serde(default)]
    pub data: Value,
    /// Paths or names of produced artifacts
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl WorkerOutput {
    /// Output with data and no artifacts
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            artifacts: Vec::new(),
        }
    }

    /// Add artifacts
    #[must_use]
    pub fn with_artifacts<I, S>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts = artifacts.into_iter().map(Into::into).collect();
        self
    }
}

/// Failure of an invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// Worker reported a failure
    #[error("Worker failed: {0}")]
    Failed(String),

    /// Worker did not answer in time
    #[error("Worker timed out after {0}ms")]
    Timeout(u64),

    /// Backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl WorkerError {
    /// Failure record for the tracker
    #[must_use]
    pub fn to_failure(&self) -> TaskFailure {
        match self {
            Self::Timeout(_) | Self::Backend(BackendError::ChannelTimeout { .. }) => {
                TaskFailure::timeout(self.to_string())
            }
            _ => TaskFailure::execution(self.to_string()),
        }
    }
}

/// Host-supplied executor of role work
#[async_trait]
pub trait WorkerExecutor: Send + Sync {
    /// Run `payload` on a worker of `worker_type`
    async fn invoke(
        &self,
        worker_type: &str,
        payload: &Value,
        context: &WorkerContext,
    ) -> Result<WorkerOutput, WorkerError>;
}

/// Executor that carries every invocation over a backend channel
///
/// The capability is the first required capability some healthy channel
/// carries, falling back to the worker type itself. The operation is
/// `invoke.<worker_type>`.
pub struct ChannelWorker {
    backend: Arc<BackendManager>,
    options: ExecuteOptions,
}

impl ChannelWorker {
    /// Create an executor over a backend manager
    #[must_use]
    pub fn new(backend: Arc<BackendManager>) -> Self {
        Self {
            backend,
            options: ExecuteOptions::default(),
        }
    }

    /// Set per-call options
    #[must_use]
    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    async fn capability_for(&self, worker_type: &str, context: &WorkerContext) -> String {
        for capability in context.requirements.capabilities.iter() {
            if self.backend.has_capability(capability.as_str()).await {
                return capability.to_string();
            }
        }
        worker_type.to_string()
    }
}

#[async_trait]
impl WorkerExecutor for ChannelWorker {
    async fn invoke(
        &self,
        worker_type: &str,
        payload: &Value,
        context: &WorkerContext,
    ) -> Result<WorkerOutput, WorkerError> {
        let capability = self.capability_for(worker_type, context).await;
        let parameters = json!({
            "worker_type": worker_type,
            "payload": payload,
            "context": context,
        });
        let result = self
            .backend
            .execute_tool_call(
                &capability,
                &format!("invoke.{}", worker_type),
                &parameters,
                &self.options,
            )
            .await?;

        // Channels may answer with a full WorkerOutput or with bare data
        let output = match serde_json::from_value::<WorkerOutput>(result.data.clone()) {
            Ok(output) if result.data.get("data").is_some() => output,
            _ => WorkerOutput::new(result.data),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_backend::{Backend, BackendConfig, ChannelFailure, ChannelSpec, HealthStatus};
    use switchyard_core::CapabilitySet;

    struct EchoBackend;

    #[async_trait]
    impl Backend for EchoBackend {
        async fn execute(&self, operation: &str, parameters: &Value) -> Result<Value, ChannelFailure> {
            if parameters["payload"]["fail"] == json!(true) {
                return Err(ChannelFailure::new("refused"));
            }
            Ok(json!({
                "data": {"operation": operation, "role": parameters["context"]["role"]},
                "artifacts": ["out.txt"],
            }))
        }

        async fn probe(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    async fn worker() -> ChannelWorker {
        let manager = BackendManager::new(BackendConfig::default());
        manager
            .register_channel(
                ChannelSpec::new("fs", CapabilitySet::from_tags(["testing"]).unwrap()).with_retry_count(0),
                Arc::new(EchoBackend),
            )
            .await
            .unwrap();
        ChannelWorker::new(Arc::new(manager)).with_options(ExecuteOptions::default().with_failover(false))
    }

    fn context(tags: &[&str]) -> WorkerContext {
        let mut context = WorkerContext::standalone(
            RequirementProfile::new(
                CapabilitySet::from_tags(tags).unwrap(),
                Default::default(),
                std::time::Duration::from_secs(1),
            ),
            1_000,
        );
        context.role = Some("testing".to_string());
        context
    }

    #[tokio::test]
    async fn test_channel_worker_invokes_backend() {
        let worker = worker().await;
        let output = worker
            .invoke("tester", &json!({"suite": "unit"}), &context(&["code-generation", "testing"]))
            .await
            .unwrap();
        assert_eq!(output.data["operation"], json!("invoke.tester"));
        assert_eq!(output.data["role"], json!("testing"));
        assert_eq!(output.artifacts, vec!["out.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_channel_worker_without_channel() {
        let worker = worker().await;
        let err = worker
            .invoke("designer", &json!({}), &context(&["ui-development"]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Backend(BackendError::NoAvailableChannel { .. })));
    }

    #[tokio::test]
    async fn test_channel_worker_failure() {
        let worker = worker().await;
        let err = worker
            .invoke("tester", &json!({"fail": true}), &context(&["testing"]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Backend(BackendError::ChannelExecution { .. })));
        assert!(!err.to_failure().is_timeout());
        assert!(WorkerError::Timeout(5).to_failure().is_timeout());
    }
}
