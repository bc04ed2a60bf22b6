//! Capability registry for worker types.
//!
//! Built once at startup from configuration and never mutated afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use switchyard_core::time::duration_ms;
use switchyard_core::{Capability, CapabilitySet, Complexity, CoreError, CoreResult};

fn default_concurrency_limit() -> u32 {
    3
}

fn default_nominal_duration() -> Duration {
    Duration::from_secs(600)
}

/// Static description of a worker type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// Worker type name
    pub worker_type: String,
    /// Capability tags served
    pub capabilities: CapabilitySet,
    /// Complexity class handled best
    #[serde(default)]
    pub complexity: Complexity,
    /// Tasks this worker type can run at once before scoring penalizes it
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: u32,
    /// Nominal duration of a typical task
    #[serde(
        rename = "nominal_duration_ms",
        with = "duration_ms",
        default = "default_nominal_duration"
    )]
    pub nominal_duration: Duration,
    /// Compatible channel tags
    #[serde(default)]
    pub channels: BTreeSet<String>,
    /// Declared specializations
    #[serde(default)]
    pub specializations: CapabilitySet,
}

impl CapabilityProfile {
    /// Create a profile with default complexity, limit and duration
    #[must_use]
    pub fn new(worker_type: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            worker_type: worker_type.into(),
            capabilities,
            complexity: Complexity::default(),
            concurrency_limit: default_concurrency_limit(),
            nominal_duration: default_nominal_duration(),
            channels: BTreeSet::new(),
            specializations: CapabilitySet::new(),
        }
    }

    /// Set complexity class
    #[must_use]
    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    /// Set concurrency limit
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: u32) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Set nominal duration
    #[must_use]
    pub fn with_nominal_duration(mut self, duration: Duration) -> Self {
        self.nominal_duration = duration;
        self
    }

    /// Set compatible channel tags
    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Set specializations
    #[must_use]
    pub fn with_specializations(mut self, specializations: CapabilitySet) -> Self {
        self.specializations = specializations;
        self
    }

    /// Check the profile is usable for routing
    ///
    /// # Errors
    ///
    /// Returns error on a blank name, an empty capability set or a zero limit
    pub fn validate(&self) -> CoreResult<()> {
        if self.worker_type.trim().is_empty() {
            return Err(CoreError::validation("worker_type", "must not be empty"));
        }
        if self.capabilities.is_empty() {
            return Err(CoreError::validation(
                format!("workers.{}.capabilities", self.worker_type),
                "must declare at least one capability",
            ));
        }
        if self.concurrency_limit == 0 {
            return Err(CoreError::validation(
                format!("workers.{}.concurrency_limit", self.worker_type),
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Read-only lookup of worker type to capability profile
///
/// Iteration follows registration order, which keeps scoring output and
/// statistics stable between runs.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    profiles: IndexMap<String, CapabilityProfile>,
}

impl CapabilityRegistry {
    /// Build a registry from profiles
    ///
    /// # Errors
    ///
    /// Returns error on an invalid profile or a duplicate worker type
    pub fn new<I>(profiles: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = CapabilityProfile>,
    {
        let mut map = IndexMap::new();
        for profile in profiles {
            profile.validate()?;
            if map.contains_key(&profile.worker_type) {
                return Err(CoreError::AlreadyExists {
                    kind: "Worker".to_string(),
                    id: profile.worker_type,
                });
            }
            map.insert(profile.worker_type.clone(), profile);
        }
        Ok(Self { profiles: map })
    }

    /// Look up a worker type
    #[must_use]
    pub fn profile_of(&self, worker_type: &str) -> Option<&CapabilityProfile> {
        self.profiles.get(worker_type)
    }

    /// All worker types in registration order
    #[must_use]
    pub fn list_worker_types(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Check if a worker type serves a capability
    #[must_use]
    pub fn supports(&self, worker_type: &str, capability: &Capability) -> bool {
        self.profiles
            .get(worker_type)
            .is_some_and(|p| p.capabilities.contains(capability))
    }

    /// Worker types sharing at least one tag with `capabilities`
    #[must_use]
    pub fn candidates_for(&self, capabilities: &CapabilitySet) -> Vec<&CapabilityProfile> {
        self.profiles
            .values()
            .filter(|p| p.capabilities.intersects(capabilities))
            .collect()
    }

    /// Iterate over profiles in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityProfile> {
        self.profiles.values()
    }

    /// Number of worker types
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
