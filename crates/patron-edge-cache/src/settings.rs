//! Cache sizing and lifetime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a single [`BoundedTtlCache`](crate::BoundedTtlCache).
///
/// # Example (TOML)
///
/// ```toml
/// [cache.identity]
/// capacity = 1000
/// present_ttl = "1h"
/// absent_ttl = "30s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of entries held before FIFO eviction engages.
    pub capacity: usize,

    /// Lifetime of an entry holding a resolved value.
    #[serde(with = "humantime_serde")]
    pub present_ttl: Duration,

    /// Lifetime of a negative ("known absent") entry.
    #[serde(with = "humantime_serde")]
    pub absent_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            present_ttl: Duration::from_secs(3600), // 1 hour
            absent_ttl: Duration::from_secs(30),
        }
    }
}

impl CacheSettings {
    /// Creates settings with explicit values.
    #[must_use]
    pub fn new(capacity: usize, present_ttl: Duration, absent_ttl: Duration) -> Self {
        Self {
            capacity,
            present_ttl,
            absent_ttl,
        }
    }

    /// Sets the capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the lifetime of present entries.
    #[must_use]
    pub fn with_present_ttl(mut self, ttl: Duration) -> Self {
        self.present_ttl = ttl;
        self
    }

    /// Sets the lifetime of absent entries.
    #[must_use]
    pub fn with_absent_ttl(mut self, ttl: Duration) -> Self {
        self.absent_ttl = ttl;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be > 0".into());
        }
        if self.present_ttl.is_zero() {
            return Err("present_ttl must be > 0".into());
        }
        if self.absent_ttl.is_zero() {
            return Err("absent_ttl must be > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.capacity, 1000);
        assert_eq!(settings.present_ttl, Duration::from_secs(3600));
        assert_eq!(settings.absent_ttl, Duration::from_secs(30));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let err = CacheSettings::default().with_capacity(0).validate();
        assert_eq!(err.unwrap_err(), "capacity must be > 0");

        let err = CacheSettings::default()
            .with_present_ttl(Duration::ZERO)
            .validate();
        assert!(err.unwrap_err().contains("present_ttl"));

        let err = CacheSettings::default()
            .with_absent_ttl(Duration::ZERO)
            .validate();
        assert!(err.unwrap_err().contains("absent_ttl"));
    }

    #[test]
    fn test_humantime_deserialization() {
        let settings: CacheSettings = serde_json::from_str(
            r#"{"capacity": 10, "present_ttl": "2m", "absent_ttl": "1500ms"}"#,
        )
        .unwrap();
        assert_eq!(settings.capacity, 10);
        assert_eq!(settings.present_ttl, Duration::from_secs(120));
        assert_eq!(settings.absent_ttl, Duration::from_millis(1500));

        // Missing fields fall back to defaults
        let settings: CacheSettings = serde_json::from_str(r#"{"capacity": 5}"#).unwrap();
        assert_eq!(settings.present_ttl, Duration::from_secs(3600));
    }
}
