//! Wait thresholds per queue
//!
//! A threshold is the longest tolerable wait, in seconds. Queues without an
//! entry fall back to the table's default. A threshold of `0` turns
//! monitoring off for that queue; it never means "alert on any wait".

use std::collections::HashMap;

use super::identifier::QueueIdentifier;
use crate::config::ConfigError;

/// Threshold applied to queues absent from the table
pub const DEFAULT_THRESHOLD_SECS: u64 = 60;

/// Configured thresholds plus the fallback default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdTable {
    pub waits: HashMap<QueueIdentifier, u64>,
    pub default_threshold: u64,
}

impl ThresholdTable {
    pub fn new() -> Self {
        Self {
            waits: HashMap::new(),
            default_threshold: DEFAULT_THRESHOLD_SECS,
        }
    }

    /// Set the threshold for one queue
    pub fn with_wait(mut self, id: QueueIdentifier, seconds: u64) -> Self {
        self.waits.insert(id, seconds);
        self
    }

    /// Set the fallback threshold
    pub fn with_default(mut self, seconds: u64) -> Self {
        self.default_threshold = seconds;
        self
    }

    /// Parse a flat JSON object of `"connection:queue": seconds` entries.
    ///
    /// Negative or fractional values are rejected here so evaluation never
    /// has to validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut table = Self::new();
        for (key, value) in raw {
            let id = QueueIdentifier::parse(&key)?;
            let seconds = value.as_u64().ok_or_else(|| ConfigError::InvalidThreshold {
                queue: key.clone(),
                value: value.to_string(),
            })?;
            table.waits.insert(id, seconds);
        }
        Ok(table)
    }

    /// Parse `redis:default=60,redis:low=0` pairs
    pub fn parse_pairs(pairs: &str) -> Result<Self, ConfigError> {
        let mut table = Self::new();
        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .rsplit_once('=')
                .ok_or_else(|| ConfigError::Parse(format!("expected queue=seconds, got '{}'", pair)))?;
            let id = QueueIdentifier::parse(key.trim())?;
            let seconds = parse_seconds(key.trim(), value.trim())?;
            table.waits.insert(id, seconds);
        }
        Ok(table)
    }

    /// Overlay `other`'s per-queue entries onto this table
    pub fn merge(mut self, other: ThresholdTable) -> Self {
        self.waits.extend(other.waits);
        self
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a non-negative whole number of seconds
pub(crate) fn parse_seconds(name: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidThreshold {
        queue: name.to_string(),
        value: value.to_string(),
    })
}

/// Resolves the threshold for a queue
#[derive(Debug, Clone, Default)]
pub struct ThresholdPolicy {
    table: ThresholdTable,
}

impl ThresholdPolicy {
    pub fn new(table: ThresholdTable) -> Self {
        Self { table }
    }

    /// Configured threshold for `id`, or the default when unlisted
    pub fn resolve(&self, id: &QueueIdentifier) -> u64 {
        self.table
            .waits
            .get(id)
            .copied()
            .unwrap_or(self.table.default_threshold)
    }

    /// Threshold exceeded by `wait_seconds`, if any.
    ///
    /// Returns `None` both when the wait is tolerable and when monitoring is
    /// disabled for the queue.
    pub fn is_exceeded(&self, id: &QueueIdentifier, wait_seconds: u64) -> Option<u64> {
        match self.resolve(id) {
            0 => None,
            threshold if wait_seconds > threshold => Some(threshold),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> QueueIdentifier {
        QueueIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let policy = ThresholdPolicy::new(
            ThresholdTable::new()
                .with_wait(id("redis:default"), 30)
                .with_default(90),
        );

        assert_eq!(policy.resolve(&id("redis:default")), 30);
        assert_eq!(policy.resolve(&id("redis:other")), 90);
    }

    #[test]
    fn test_zero_disables_monitoring() {
        let policy = ThresholdPolicy::new(ThresholdTable::new().with_wait(id("redis:ignore-queue"), 0));

        assert_eq!(policy.resolve(&id("redis:ignore-queue")), 0);
        assert_eq!(policy.is_exceeded(&id("redis:ignore-queue"), 10), None);
        assert_eq!(policy.is_exceeded(&id("redis:ignore-queue"), u64::MAX), None);
    }

    #[test]
    fn test_exceeded_is_strict() {
        let policy = ThresholdPolicy::default();

        assert_eq!(policy.is_exceeded(&id("redis:default"), 59), None);
        assert_eq!(policy.is_exceeded(&id("redis:default"), 60), None);
        assert_eq!(policy.is_exceeded(&id("redis:default"), 61), Some(60));
    }

    #[test]
    fn test_default_zero_disables_unlisted_queues() {
        let policy = ThresholdPolicy::new(
            ThresholdTable::new()
                .with_default(0)
                .with_wait(id("redis:critical"), 5),
        );

        assert_eq!(policy.is_exceeded(&id("redis:anything"), 10_000), None);
        assert_eq!(policy.is_exceeded(&id("redis:critical"), 6), Some(5));
    }

    #[test]
    fn test_from_json_rejects_negative() {
        let table = ThresholdTable::from_json(r#"{"redis:default": 60, "redis:low": 0}"#).unwrap();
        assert_eq!(table.waits.len(), 2);
        assert_eq!(table.default_threshold, DEFAULT_THRESHOLD_SECS);

        let err = ThresholdTable::from_json(r#"{"redis:default": -1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold { .. }));

        let err = ThresholdTable::from_json(r#"{"redis:default": 1.5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold { .. }));

        let err = ThresholdTable::from_json(r#"{"default": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Identifier(_)));
    }

    #[test]
    fn test_parse_pairs() {
        let table = ThresholdTable::parse_pairs("redis:default=60, redis:low=0,").unwrap();
        assert_eq!(table.waits[&id("redis:default")], 60);
        assert_eq!(table.waits[&id("redis:low")], 0);

        assert!(ThresholdTable::parse_pairs("redis:default=-5").is_err());
        assert!(ThresholdTable::parse_pairs("redis:default").is_err());
    }

    #[test]
    fn test_merge_overlays_entries() {
        let base = ThresholdTable::parse_pairs("redis:a=10,redis:b=20").unwrap().with_default(45);
        let merged = base.merge(ThresholdTable::parse_pairs("redis:b=0").unwrap());

        assert_eq!(merged.waits[&id("redis:a")], 10);
        assert_eq!(merged.waits[&id("redis:b")], 0);
        assert_eq!(merged.default_threshold, 45);
    }
}
