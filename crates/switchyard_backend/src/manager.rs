//! Backend connection manager.

use crate::channel::{Backend, Channel, ChannelSpec, ChannelStatus, HealthStatus};
use crate::error::{BackendError, BackendResult};
use crate::health::{HealthCheckHandle, HealthConfig, probe_channel};
use crate::selection::{ChannelCandidate, ChannelSelector, SelectionStrategy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use switchyard_core::{Capability, elapsed_ms};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Manager configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Channel selection strategy
    pub selection: SelectionStrategy,
    /// Health probing
    pub health: HealthConfig,
    /// Consecutive failures on a channel before a call fails over
    pub failover_threshold: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            selection: SelectionStrategy::default(),
            health: HealthConfig::default(),
            failover_threshold: 2,
        }
    }
}

impl BackendConfig {
    /// Set selection strategy
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionStrategy) -> Self {
        self.selection = selection;
        self
    }

    /// Set health settings
    #[must_use]
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }

    /// Set failover threshold
    #[must_use]
    pub fn with_failover_threshold(mut self, threshold: u32) -> Self {
        self.failover_threshold = threshold;
        self
    }
}

/// Per-call options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
    /// Channel to use when it is healthy and carries the capability
    pub preferred_server: Option<String>,
    /// Fail over to another channel after repeated failures
    pub allow_failover: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            preferred_server: None,
            allow_failover: true,
        }
    }
}

impl ExecuteOptions {
    /// Prefer a channel
    #[must_use]
    pub fn with_preferred_server(mut self, name: impl Into<String>) -> Self {
        self.preferred_server = Some(name.into());
        self
    }

    /// Enable or disable failover
    #[must_use]
    pub fn with_failover(mut self, allow: bool) -> Self {
        self.allow_failover = allow;
        self
    }
}

/// Successful call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Channel that served the call
    pub channel: String,
    /// Returned data
    pub data: Value,
    /// Attempts across all channels
    pub attempts: u32,
    /// Whether the call moved to a second channel
    pub failed_over: bool,
    /// Latency of the successful attempt
    pub response_time_ms: u64,
}

/// Manager of named backend channels
pub struct BackendManager {
    config: BackendConfig,
    selector: ChannelSelector,
    channels: RwLock<IndexMap<String, Arc<Channel>>>,
}

impl BackendManager {
    /// Create a manager with no channels
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            selector: ChannelSelector::new(config.selection),
            channels: RwLock::new(IndexMap::new()),
        }
    }

    /// Manager configuration
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Register a channel
    ///
    /// # Errors
    ///
    /// Returns error if the channel definition is invalid or the name is taken
    pub async fn register_channel(
        &self,
        spec: ChannelSpec,
        backend: Arc<dyn Backend>,
    ) -> BackendResult<()> {
        spec.validate()?;
        let mut channels = self.channels.write().await;
        if channels.contains_key(&spec.name) {
            return Err(BackendError::DuplicateChannel(spec.name));
        }
        info!(
            channel = %spec.name,
            capabilities = %spec.capabilities,
            priority = spec.priority,
            "Registered channel"
        );
        channels.insert(spec.name.clone(), Arc::new(Channel::new(spec, backend)));
        Ok(())
    }

    async fn channel(&self, name: &str) -> BackendResult<Arc<Channel>> {
        self.channels
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::UnknownChannel(name.to_string()))
    }

    /// Snapshot of one channel
    ///
    /// # Errors
    ///
    /// Returns error if the channel is unknown
    pub async fn channel_status(&self, name: &str) -> BackendResult<ChannelStatus> {
        Ok(self.channel(name).await?.status().await)
    }

    /// Snapshot of every channel in registration order
    pub async fn channels(&self) -> Vec<ChannelStatus> {
        let channels: Vec<Arc<Channel>> = self.channels.read().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(channels.len());
        for channel in channels {
            statuses.push(channel.status().await);
        }
        statuses
    }

    /// Probe one channel now
    ///
    /// # Errors
    ///
    /// Returns error if the channel is unknown
    pub async fn probe_channel(&self, name: &str) -> BackendResult<HealthStatus> {
        let channel = self.channel(name).await?;
        Ok(probe_channel(&channel, &self.config.health).await)
    }

    /// Probe every channel now
    pub async fn probe_all(&self) -> IndexMap<String, HealthStatus> {
        let channels: Vec<Arc<Channel>> = self.channels.read().await.values().cloned().collect();
        let mut results = IndexMap::new();
        for channel in channels {
            let status = probe_channel(&channel, &self.config.health).await;
            results.insert(channel.spec.name.clone(), status);
        }
        results
    }

    /// Start one periodic probe task per registered channel
    pub async fn start_health_checks(&self) -> HealthCheckHandle {
        let channels: Vec<Arc<Channel>> = self.channels.read().await.values().cloned().collect();
        debug!(channels = channels.len(), "Starting health checks");
        HealthCheckHandle::spawn(channels, self.config.health)
    }

    /// Check if any healthy channel carries a capability
    pub async fn has_capability(&self, capability: &str) -> bool {
        let Ok(capability) = Capability::new(capability) else {
            return false;
        };
        !self.candidates(&capability, &[]).await.is_empty()
    }

    /// Healthy channels carrying the capability, minus `excluded`
    async fn candidates(
        &self,
        capability: &Capability,
        excluded: &[String],
    ) -> Vec<(Arc<Channel>, ChannelCandidate)> {
        let channels: Vec<Arc<Channel>> = self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.carries(capability) && !excluded.contains(&c.spec.name))
            .cloned()
            .collect();

        let mut candidates = Vec::with_capacity(channels.len());
        for channel in channels {
            let state = channel.state.read().await;
            if state.health.is_healthy() {
                let candidate = ChannelCandidate {
                    name: channel.spec.name.clone(),
                    priority: channel.spec.priority,
                    active_connections: channel.active_connections(),
                };
                drop(state);
                candidates.push((channel, candidate));
            }
        }
        candidates
    }

    async fn pick(
        &self,
        capability: &Capability,
        preferred: Option<&str>,
        excluded: &[String],
    ) -> Option<Arc<Channel>> {
        let candidates = self.candidates(capability, excluded).await;
        if let Some(preferred) = preferred {
            if let Some((channel, _)) = candidates.iter().find(|(c, _)| c.spec.name == preferred) {
                return Some(Arc::clone(channel));
            }
            debug!(preferred, "Preferred channel unavailable, falling back to selection");
        }
        let list: Vec<ChannelCandidate> = candidates.iter().map(|(_, c)| c.clone()).collect();
        let chosen = self.selector.select(&list)?;
        candidates
            .into_iter()
            .find(|(c, _)| c.spec.name == chosen.name)
            .map(|(channel, _)| channel)
    }

    /// One bounded attempt against a channel
    async fn attempt(
        &self,
        channel: &Channel,
        operation: &str,
        parameters: &Value,
    ) -> BackendResult<(Value, u64)> {
        channel.state.write().await.begin_attempt();
        let connection = channel.connect();
        let started = Instant::now();
        let result = tokio::time::timeout(
            channel.spec.timeout,
            channel.backend.execute(operation, parameters),
        )
        .await;
        let response_ms = elapsed_ms(started);

        let error = match result {
            Ok(Ok(data)) => {
                channel.state.write().await.record_success(response_ms);
                connection.settle();
                return Ok((data, response_ms));
            }
            Ok(Err(failure)) => BackendError::ChannelExecution {
                channel: channel.spec.name.clone(),
                message: failure.message,
            },
            Err(_) => BackendError::ChannelTimeout {
                channel: channel.spec.name.clone(),
                timeout_ms: channel.spec.timeout_ms(),
            },
        };

        let mut state = channel.state.write().await;
        if state.record_failure(self.config.health.failure_threshold) {
            warn!(
                channel = %channel.spec.name,
                consecutive_failures = state.consecutive_failures,
                "Channel marked unhealthy after failed calls"
            );
        }
        connection.settle();
        Err(error)
    }

    /// Attempt a channel, retrying up to its retry count while it stays healthy
    async fn run_on_channel(
        &self,
        channel: &Channel,
        operation: &str,
        parameters: &Value,
        attempts: &mut u32,
    ) -> BackendResult<(Value, u64)> {
        let mut remaining = channel.spec.retry_count;
        loop {
            *attempts += 1;
            match self.attempt(channel, operation, parameters).await {
                Ok(done) => return Ok(done),
                Err(e) => {
                    let healthy = channel.state.read().await.health.is_healthy();
                    if remaining == 0 || !healthy {
                        return Err(e);
                    }
                    remaining -= 1;
                    debug!(channel = %channel.spec.name, error = %e, remaining, "Retrying channel");
                }
            }
        }
    }

    /// Carry out an operation on a channel that carries `capability`
    ///
    /// # Errors
    ///
    /// Returns `NoAvailableChannel` when no healthy channel carries the
    /// capability, the channel error when failover is not attempted, and
    /// `AllChannelsFailed` when the failover channel also failed or no
    /// failover candidate remained.
    pub async fn execute_tool_call(
        &self,
        capability: &str,
        operation: &str,
        parameters: &Value,
        options: &ExecuteOptions,
    ) -> BackendResult<ToolCallResult> {
        let capability = Capability::new(capability)?;
        let mut channel = self
            .pick(&capability, options.preferred_server.as_deref(), &[])
            .await
            .ok_or_else(|| BackendError::NoAvailableChannel {
                capability: capability.to_string(),
            })?;

        let mut attempted: Vec<String> = Vec::new();
        let mut attempts = 0;
        let mut failed_over = false;

        loop {
            match self.run_on_channel(&channel, operation, parameters, &mut attempts).await {
                Ok((data, response_time_ms)) => {
                    debug!(
                        channel = %channel.spec.name,
                        operation,
                        attempts,
                        response_time_ms,
                        "Call succeeded"
                    );
                    return Ok(ToolCallResult {
                        channel: channel.spec.name.clone(),
                        data,
                        attempts,
                        failed_over,
                        response_time_ms,
                    });
                }
                Err(error) => {
                    attempted.push(channel.spec.name.clone());
                    let consecutive = channel.state.read().await.consecutive_failures;
                    let wants_failover = options.allow_failover
                        && consecutive >= self.config.failover_threshold;
                    if !failed_over && !wants_failover {
                        return Err(error);
                    }

                    // The failover channel is the last candidate
                    let next = if failed_over {
                        None
                    } else {
                        self.pick(&capability, None, &attempted).await
                    };
                    let Some(next) = next else {
                        warn!(capability = %capability, ?attempted, error = %error, "All channels failed");
                        return Err(BackendError::AllChannelsFailed {
                            capability: capability.to_string(),
                            attempted,
                            last_error: error.to_string(),
                        });
                    };

                    warn!(
                        from = %channel.spec.name,
                        to = %next.spec.name,
                        consecutive_failures = consecutive,
                        "Failing over"
                    );
                    channel = next;
                    failed_over = true;
                }
            }
        }
    }
}
