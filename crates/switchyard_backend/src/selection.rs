//! Channel selection strategies.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use switchyard_core::CoreError;

/// How a channel is picked among healthy compatible candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Highest declared priority
    #[default]
    Priority,
    /// Rotate through candidates
    RoundRobin,
    /// Fewest calls in flight
    LeastConnections,
}

impl SelectionStrategy {
    /// Strategy name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::RoundRobin => "round-robin",
            Self::LeastConnections => "least-connections",
        }
    }
}

impl std::str::FromStr for SelectionStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Priority, Self::RoundRobin, Self::LeastConnections]
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| {
                CoreError::validation("backend.selection", format!("unknown strategy '{}'", s))
            })
    }
}

/// Selection input for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCandidate {
    /// Channel name
    pub name: String,
    /// Declared priority
    pub priority: u32,
    /// Calls in flight
    pub active_connections: u32,
}

/// Stateful selector; round-robin keeps its position between calls
#[derive(Debug, Default)]
pub struct ChannelSelector {
    strategy: SelectionStrategy,
    counter: AtomicUsize,
}

impl ChannelSelector {
    /// Create a selector
    #[must_use]
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
            counter: AtomicUsize::new(0),
        }
    }

    /// Configured strategy
    #[must_use]
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Pick a candidate; `None` when the list is empty
    pub fn select<'a>(&self, candidates: &'a [ChannelCandidate]) -> Option<&'a ChannelCandidate> {
        if candidates.is_empty() {
            return None;
        }
        match self.strategy {
            SelectionStrategy::Priority => candidates
                .iter()
                .max_by(|a, b| a.priority.cmp(&b.priority).then_with(|| b.name.cmp(&a.name))),
            SelectionStrategy::RoundRobin => {
                let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
                candidates.get(index)
            }
            SelectionStrategy::LeastConnections => candidates.iter().min_by(|a, b| {
                a.active_connections
                    .cmp(&b.active_connections)
                    .then_with(|| b.priority.cmp(&a.priority))
                    .then_with(|| a.name.cmp(&b.name))
            }),
        }
    }
}
