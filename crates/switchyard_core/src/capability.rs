//! Capability tags for capability-based routing.
//!
//! A capability is a short kebab-case tag such as `code-generation` or
//! `api-development`. Worker types declare the tags they can serve, tasks
//! derive the tags they need, and channels advertise the tags they carry.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single named ability tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability(String);

impl Capability {
    /// Create a capability from a tag, normalizing case and surrounding whitespace
    ///
    /// # Errors
    ///
    /// Returns error if the tag is empty or contains whitespace
    pub fn new(tag: impl AsRef<str>) -> CoreResult<Self> {
        let normalized = tag.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(CoreError::InvalidCapability {
                reason: "capability tag is empty".to_string(),
            });
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidCapability {
                reason: format!("capability tag '{}' contains whitespace", normalized),
            });
        }
        Ok(Self(normalized))
    }

    /// Create a capability from a tag known to be well formed
    #[must_use]
    pub fn from_static(tag: &'static str) -> Self {
        Self(tag.to_string())
    }

    /// Get the tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Capability {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.0
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered set of capability tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    capabilities: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Create a new empty capability set
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::new(),
        }
    }

    /// Build a set from raw tags
    ///
    /// # Errors
    ///
    /// Returns error if any tag is malformed
    pub fn from_tags<I, S>(tags: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for tag in tags {
            set.insert(Capability::new(tag)?);
        }
        Ok(set)
    }

    /// Add a capability
    pub fn insert(&mut self, capability: Capability) -> bool {
        self.capabilities.insert(capability)
    }

    /// Check if a capability is present
    #[must_use]
    pub fn contains(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Check if a tag is present without allocating a `Capability`
    #[must_use]
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c.as_str() == tag)
    }

    /// Number of tags shared with another set
    #[must_use]
    pub fn overlap(&self, other: &CapabilitySet) -> usize {
        self.capabilities.intersection(&other.capabilities).count()
    }

    /// Check if any tag is shared with another set
    #[must_use]
    pub fn intersects(&self, other: &CapabilitySet) -> bool {
        self.overlap(other) > 0
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: &CapabilitySet) {
        self.capabilities.extend(other.capabilities.iter().cloned());
    }

    /// Get the number of capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Iterate over capabilities in tag order
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    /// First tag in order, used as the primary capability of a requirement
    #[must_use]
    pub fn first(&self) -> Option<&Capability> {
        self.capabilities.iter().next()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: Vec<&str> = self.capabilities.iter().map(Capability::as_str).collect();
        write!(f, "[{}]", tags.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_normalized() {
        let cap = Capability::new("  API-Development ").unwrap();
        assert_eq!(cap.as_str(), "api-development");
    }

    #[test]
    fn test_capability_rejects_empty_and_whitespace() {
        assert!(Capability::new("").is_err());
        assert!(Capability::new("   ").is_err());
        assert!(Capability::new("code generation").is_err());
    }

    #[test]
    fn test_capability_set_overlap() {
        let a = CapabilitySet::from_tags(["testing", "code-generation", "database"]).unwrap();
        let b = CapabilitySet::from_tags(["testing", "database", "deployment"]).unwrap();
        assert_eq!(a.overlap(&b), 2);
        assert!(a.intersects(&b));

        let c = CapabilitySet::from_tags(["ui-development"]).unwrap();
        assert_eq!(a.overlap(&c), 0);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_capability_set_dedup_and_order() {
        let set = CapabilitySet::from_tags(["testing", "Testing", "api-development"]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.first().map(Capability::as_str), Some("api-development"));
        assert_eq!(set.to_string(), "[api-development,testing]");
    }

    #[test]
    fn test_capability_set_serde_transparent() {
        let set = CapabilitySet::from_tags(["testing", "database"]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["database","testing"]"#);
        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);

        let normalized: CapabilitySet = serde_json::from_str(r#"["Testing"]"#).unwrap();
        assert!(normalized.contains_tag("testing"));
        assert!(serde_json::from_str::<CapabilitySet>(r#"[""]"#).is_err());
    }

    #[test]
    fn test_contains_tag() {
        let set = CapabilitySet::from_tags(["workflow-coordination"]).unwrap();
        assert!(set.contains_tag("workflow-coordination"));
        assert!(!set.contains_tag("testing"));
    }

    proptest::proptest! {
        #[test]
        fn test_overlap_is_symmetric_and_order_free(
            left in proptest::collection::vec("[a-z]{1,6}", 0..8),
            right in proptest::collection::vec("[a-z]{1,6}", 0..8),
        ) {
            let a = CapabilitySet::from_tags(left.iter()).unwrap();
            let b = CapabilitySet::from_tags(right.iter()).unwrap();
            let reversed = CapabilitySet::from_tags(left.iter().rev()).unwrap();
            proptest::prop_assert_eq!(a.overlap(&b), b.overlap(&a));
            proptest::prop_assert_eq!(&a, &reversed);
            proptest::prop_assert_eq!(a.intersects(&b), a.overlap(&b) > 0);
        }
    }
}
