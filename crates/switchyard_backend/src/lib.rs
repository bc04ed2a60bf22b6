//! SWITCHYARD Backend
//!
//! Named execution channels carrying capability-tagged operations. Each
//! channel has a priority, a timeout and a retry budget, and is probed on
//! its own timer. The manager picks a healthy compatible channel per call,
//! retries on the same channel and fails over once to another.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod error;
pub mod health;
pub mod manager;
pub mod selection;

pub use channel::{Backend, ChannelFailure, ChannelMetrics, ChannelSpec, ChannelStatus, HealthStatus};
pub use error::{BackendError, BackendResult};
pub use health::{HealthCheckHandle, HealthConfig};
pub use manager::{BackendConfig, BackendManager, ExecuteOptions, ToolCallResult};
pub use selection::{ChannelCandidate, ChannelSelector, SelectionStrategy};
