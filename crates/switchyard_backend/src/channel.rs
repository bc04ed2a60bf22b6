//! Backend channels.
//!
//! A channel pairs a host-supplied [`Backend`] with its static [`ChannelSpec`]
//! and the mutable health and metrics state the manager keeps for it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use switchyard_core::time::duration_ms;
use switchyard_core::{Capability, CapabilitySet, CoreError, CoreResult, Timestamp, now};
use tokio::sync::RwLock;

/// Health of a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting calls
    #[default]
    Healthy,
    /// Excluded from selection until a probe succeeds
    Unhealthy,
}

impl HealthStatus {
    /// Check if healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// Error reported by a backend for a single call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ChannelFailure {
    /// Human readable message
    pub message: String,
}

impl ChannelFailure {
    /// Create a failure
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Host-supplied execution endpoint
#[async_trait]
pub trait Backend: Send + Sync {
    /// Carry out an operation
    async fn execute(&self, operation: &str, parameters: &Value) -> Result<Value, ChannelFailure>;

    /// Report current health
    async fn probe(&self) -> HealthStatus;
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_count() -> u32 {
    1
}

/// Static description of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Unique channel name
    pub name: String,
    /// Capability tags carried
    pub capabilities: CapabilitySet,
    /// Selection priority; higher wins
    #[serde(default)]
    pub priority: u32,
    /// Per-attempt timeout
    #[serde(rename = "timeout_ms", with = "duration_ms", default = "default_timeout")]
    pub timeout: Duration,
    /// Extra attempts on the same channel after a failure
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl ChannelSpec {
    /// Create a spec with default priority, timeout and retries
    #[must_use]
    pub fn new(name: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            name: name.into(),
            capabilities,
            priority: 0,
            timeout: default_timeout(),
            retry_count: default_retry_count(),
        }
    }

    /// Set priority
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Check the channel definition is usable
    ///
    /// # Errors
    ///
    /// Returns error on a blank name, no capabilities or a zero timeout
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("channels.name", "must not be empty"));
        }
        if self.capabilities.is_empty() {
            return Err(CoreError::validation(
                format!("channels.{}.capabilities", self.name),
                "must declare at least one capability",
            ));
        }
        if self.timeout.is_zero() {
            return Err(CoreError::validation(
                format!("channels.{}.timeout_ms", self.name),
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Timeout in milliseconds
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Request counters of a channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    /// Attempts made
    pub total_requests: u64,
    /// Successful attempts
    pub successful_requests: u64,
    /// Failed attempts, timeouts included
    pub failed_requests: u64,
    /// Attempts dropped by the caller before they settled
    #[serde(default)]
    pub cancelled_requests: u64,
    /// Average latency of successful attempts in milliseconds
    pub average_response_ms: f64,
}

/// Snapshot of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Channel name
    pub name: String,
    /// Capability tags carried
    pub capabilities: CapabilitySet,
    /// Selection priority
    pub priority: u32,
    /// Current health
    pub health: HealthStatus,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Calls in flight
    pub active_connections: u32,
    /// Request counters
    pub metrics: ChannelMetrics,
    /// Time of the last probe
    pub last_probe: Option<Timestamp>,
}

#[derive(Debug, Default)]
pub(crate) struct ChannelState {
    pub(crate) health: HealthStatus,
    pub(crate) consecutive_failures: u32,
    pub(crate) metrics: ChannelMetrics,
    pub(crate) last_probe: Option<Timestamp>,
}

impl ChannelState {
    pub(crate) fn begin_attempt(&mut self) {
        self.metrics.total_requests += 1;
    }

    pub(crate) fn record_success(&mut self, response_ms: u64) {
        self.metrics.successful_requests += 1;
        let n = self.metrics.successful_requests as f64;
        self.metrics.average_response_ms += (response_ms as f64 - self.metrics.average_response_ms) / n;
        self.consecutive_failures = 0;
    }

    /// Returns true when this failure flipped the channel to unhealthy
    pub(crate) fn record_failure(&mut self, threshold: u32) -> bool {
        self.metrics.failed_requests += 1;
        self.register_failure(threshold)
    }

    /// Returns the new health when the probe changed it
    pub(crate) fn record_probe(&mut self, status: HealthStatus, threshold: u32) -> Option<HealthStatus> {
        self.last_probe = Some(now());
        match status {
            HealthStatus::Healthy => {
                self.consecutive_failures = 0;
                let recovered = !self.health.is_healthy();
                self.health = HealthStatus::Healthy;
                recovered.then_some(HealthStatus::Healthy)
            }
            HealthStatus::Unhealthy => self
                .register_failure(threshold)
                .then_some(HealthStatus::Unhealthy),
        }
    }

    fn register_failure(&mut self, threshold: u32) -> bool {
        self.consecutive_failures += 1;
        if self.health.is_healthy() && self.consecutive_failures >= threshold {
            self.health = HealthStatus::Unhealthy;
            return true;
        }
        false
    }
}

/// A registered channel
pub(crate) struct Channel {
    pub(crate) spec: ChannelSpec,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) state: RwLock<ChannelState>,
    active: AtomicU32,
    cancelled: AtomicU64,
}

/// Connection slot held for one attempt
///
/// The slot is released on drop, so an attempt whose future is dropped
/// mid-call never leaks a connection. Dropping without [`settle`] counts
/// the attempt as cancelled.
///
/// [`settle`]: ConnectionGuard::settle
pub(crate) struct ConnectionGuard<'a> {
    channel: &'a Channel,
    settled: bool,
}

impl ConnectionGuard<'_> {
    /// Mark the attempt as recorded and release the slot
    pub(crate) fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.channel.active.fetch_sub(1, Ordering::SeqCst);
        if !self.settled {
            self.channel.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Channel {
    pub(crate) fn new(spec: ChannelSpec, backend: Arc<dyn Backend>) -> Self {
        Self {
            spec,
            backend,
            state: RwLock::new(ChannelState::default()),
            active: AtomicU32::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    /// Take a connection slot for one attempt
    pub(crate) fn connect(&self) -> ConnectionGuard<'_> {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            channel: self,
            settled: false,
        }
    }

    pub(crate) fn active_connections(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn carries(&self, capability: &Capability) -> bool {
        self.spec.capabilities.contains(capability)
    }

    pub(crate) async fn status(&self) -> ChannelStatus {
        let state = self.state.read().await;
        let mut metrics = state.metrics.clone();
        metrics.cancelled_requests = self.cancelled.load(Ordering::SeqCst);
        ChannelStatus {
            name: self.spec.name.clone(),
            capabilities: self.spec.capabilities.clone(),
            priority: self.spec.priority,
            health: state.health,
            consecutive_failures: state.consecutive_failures,
            active_connections: self.active_connections(),
            metrics,
            last_probe: state.last_probe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_flip_at_threshold() {
        let mut state = ChannelState::default();
        state.begin_attempt();
        assert!(!state.record_failure(3));
        state.begin_attempt();
        assert!(!state.record_failure(3));
        assert!(state.health.is_healthy());
        state.begin_attempt();
        assert!(state.record_failure(3));
        assert_eq!(state.health, HealthStatus::Unhealthy);
        // Further failures do not report a new transition
        assert_eq!(state.record_probe(HealthStatus::Unhealthy, 3), None);
        assert_eq!(state.consecutive_failures, 4);
    }

    #[test]
    fn test_good_probe_recovers() {
        let mut state = ChannelState::default();
        for _ in 0..3 {
            state.record_probe(HealthStatus::Unhealthy, 3);
        }
        assert_eq!(state.health, HealthStatus::Unhealthy);
        assert_eq!(state.record_probe(HealthStatus::Healthy, 3), Some(HealthStatus::Healthy));
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_probe.is_some());
        assert_eq!(state.record_probe(HealthStatus::Healthy, 3), None);
    }

    #[test]
    fn test_success_updates_latency_and_resets() {
        let mut state = ChannelState::default();
        state.begin_attempt();
        state.record_failure(3);
        state.begin_attempt();
        state.record_success(100);
        state.begin_attempt();
        state.record_success(300);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.metrics.total_requests, 3);
        assert_eq!(state.metrics.failed_requests, 1);
        assert_eq!(state.metrics.successful_requests, 2);
        assert!((state.metrics.average_response_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_spec_validation_and_defaults() {
        let spec: ChannelSpec =
            serde_json::from_str(r#"{"name": "fs", "capabilities": ["filesystem"]}"#).unwrap();
        assert_eq!(spec.timeout, Duration::from_secs(30));
        assert_eq!(spec.retry_count, 1);
        assert!(spec.validate().is_ok());

        let bad = ChannelSpec::new("fs", CapabilitySet::new());
        assert!(bad.validate().is_err());
        let zero = ChannelSpec::new("fs", CapabilitySet::from_tags(["filesystem"]).unwrap())
            .with_timeout(Duration::ZERO);
        assert!(zero.validate().is_err());
    }
}
