//! Time helpers for SWITCHYARD.
//!
//! Wall clock timestamps are metadata (decision and workflow timestamps).
//! Latencies are measured with `Instant` and reported in milliseconds.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Wall clock timestamp
pub type Timestamp = DateTime<Utc>;

/// Get current timestamp
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Milliseconds elapsed since `start`, saturating at `u64::MAX`
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Age of a timestamp relative to now; zero for timestamps in the future
#[must_use]
pub fn age(since: Timestamp) -> Duration {
    (Utc::now() - since).to_std().unwrap_or(Duration::ZERO)
}

/// Serde adapter storing a `Duration` as integer milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as milliseconds
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Deserialize from milliseconds
    ///
    /// # Errors
    ///
    /// Propagates deserializer errors
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "duration_ms")]
        timeout: Duration,
    }

    #[test]
    fn test_duration_ms_serde() {
        let holder = Holder {
            timeout: Duration::from_millis(1500),
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"timeout":1500}"#);
        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, holder);
    }

    #[test]
    fn test_age_of_future_timestamp_is_zero() {
        let future = now() + chrono::Duration::seconds(60);
        assert_eq!(age(future), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_ms_monotonic() {
        let start = Instant::now();
        let first = elapsed_ms(start);
        let second = elapsed_ms(start);
        assert!(second >= first);
    }
}
