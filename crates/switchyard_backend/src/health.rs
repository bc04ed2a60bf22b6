//! Channel health probing.
//!
//! Each channel is probed on its own tokio interval. A probe only ever
//! transitions channel status and never holds the state lock while the
//! backend is being called.

use crate::channel::{Channel, HealthStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::time::duration_ms;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Health monitoring settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Time between probes of one channel
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    /// Consecutive failures that mark a channel unhealthy
    pub failure_threshold: u32,
    /// Probes slower than this count as unhealthy
    #[serde(rename = "probe_timeout_ms", with = "duration_ms")]
    pub probe_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            failure_threshold: 3,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl HealthConfig {
    /// Set probe interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set probe timeout
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// Probe a channel once and apply the result
pub(crate) async fn probe_channel(channel: &Channel, config: &HealthConfig) -> HealthStatus {
    let observed = match tokio::time::timeout(config.probe_timeout, channel.backend.probe()).await {
        Ok(status) => status,
        Err(_) => {
            debug!(channel = %channel.spec.name, "Health probe timed out");
            HealthStatus::Unhealthy
        }
    };

    let mut state = channel.state.write().await;
    match state.record_probe(observed, config.failure_threshold) {
        Some(HealthStatus::Healthy) => {
            info!(channel = %channel.spec.name, "Channel recovered");
        }
        Some(HealthStatus::Unhealthy) => {
            warn!(
                channel = %channel.spec.name,
                consecutive_failures = state.consecutive_failures,
                "Channel marked unhealthy"
            );
        }
        None => {}
    }
    state.health
}

/// Handle to the running probe tasks; dropping it stops them
#[derive(Debug)]
pub struct HealthCheckHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl HealthCheckHandle {
    pub(crate) fn spawn(channels: Vec<Arc<Channel>>, config: HealthConfig) -> Self {
        let token = CancellationToken::new();
        let tasks = channels
            .into_iter()
            .map(|channel| {
                let token = token.child_token();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(config.interval);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            () = token.cancelled() => break,
                            _ = interval.tick() => {
                                probe_channel(&channel, &config).await;
                            }
                        }
                    }
                    debug!(channel = %channel.spec.name, "Health checks stopped");
                })
            })
            .collect();
        Self { token, tasks }
    }

    /// Number of probe tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if no channel is being probed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop all probe tasks and wait for them to exit
    pub async fn stop(mut self) {
        self.token.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Health check task ended abnormally");
            }
        }
    }
}

impl Drop for HealthCheckHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
