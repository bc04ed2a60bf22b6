//! Backend errors.

use switchyard_core::CoreError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by the backend manager
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// An attempt exceeded the channel timeout
    #[error("Channel {channel} timed out after {timeout_ms}ms")]
    ChannelTimeout {
        /// Channel name
        channel: String,
        /// Timeout applied
        timeout_ms: u64,
    },

    /// The channel reported an error
    #[error("Channel {channel} failed: {message}")]
    ChannelExecution {
        /// Channel name
        channel: String,
        /// Reported error
        message: String,
    },

    /// The selected channel and the failover candidate all failed
    #[error("All channels failed for {capability} (tried {attempted:?}): {last_error}")]
    AllChannelsFailed {
        /// Requested capability
        capability: String,
        /// Channels tried, in order
        attempted: Vec<String>,
        /// Last error observed
        last_error: String,
    },

    /// No healthy channel carries the capability
    #[error("No available channel for {capability}")]
    NoAvailableChannel {
        /// Requested capability
        capability: String,
    },

    /// Channel name is not registered
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Channel name is already registered
    #[error("Channel already registered: {0}")]
    DuplicateChannel(String),

    /// Shared validation failure
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BackendError {
    /// Check if this error came from a single channel attempt
    #[must_use]
    pub fn is_channel_failure(&self) -> bool {
        matches!(self, Self::ChannelTimeout { .. } | Self::ChannelExecution { .. })
    }
}
