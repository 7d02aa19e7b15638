//! Queue identifiers
//!
//! A queue is addressed by the connection (backend) it lives on plus its
//! name. The canonical text form `connection:queue` is the join key between
//! wait-time snapshots and threshold configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Composite key identifying one queue on one connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueIdentifier {
    connection: String,
    queue: String,
}

impl QueueIdentifier {
    pub fn new(connection: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            queue: queue.into(),
        }
    }

    /// Parse the canonical `connection:queue` form.
    ///
    /// Only the first `:` separates the parts, so queue names may contain
    /// colons themselves (`redis:emails:high` is queue `emails:high`).
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let (connection, queue) = s
            .split_once(':')
            .ok_or_else(|| IdentifierError::MissingSeparator(s.to_string()))?;

        if connection.is_empty() {
            return Err(IdentifierError::EmptyConnection(s.to_string()));
        }
        if queue.is_empty() {
            return Err(IdentifierError::EmptyQueue(s.to_string()));
        }

        Ok(Self::new(connection, queue))
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl fmt::Display for QueueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection, self.queue)
    }
}

impl FromStr for QueueIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for QueueIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QueueIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Identifier parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("Queue identifier '{0}' is not in connection:queue form")]
    MissingSeparator(String),

    #[error("Queue identifier '{0}' has an empty connection")]
    EmptyConnection(String),

    #[error("Queue identifier '{0}' has an empty queue name")]
    EmptyQueue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_and_display() {
        let id = QueueIdentifier::parse("redis:test-queue").unwrap();
        assert_eq!(id.connection(), "redis");
        assert_eq!(id.queue(), "test-queue");
        assert_eq!(id.to_string(), "redis:test-queue");
    }

    #[test]
    fn test_parse_splits_on_first_colon() {
        let id: QueueIdentifier = "redis:emails:high".parse().unwrap();
        assert_eq!(id.connection(), "redis");
        assert_eq!(id.queue(), "emails:high");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            QueueIdentifier::parse("default"),
            Err(IdentifierError::MissingSeparator("default".to_string()))
        );
        assert!(matches!(
            QueueIdentifier::parse(":default"),
            Err(IdentifierError::EmptyConnection(_))
        ));
        assert!(matches!(
            QueueIdentifier::parse("redis:"),
            Err(IdentifierError::EmptyQueue(_))
        ));
    }

    #[test]
    fn test_serde_as_map_key() {
        let json = r#"{"redis:default": 60, "sqs:low": 0}"#;
        let waits: HashMap<QueueIdentifier, u64> = serde_json::from_str(json).unwrap();
        assert_eq!(waits[&QueueIdentifier::new("redis", "default")], 60);
        assert_eq!(waits[&QueueIdentifier::new("sqs", "low")], 0);

        let encoded = serde_json::to_string(&QueueIdentifier::new("redis", "default")).unwrap();
        assert_eq!(encoded, r#""redis:default""#);
    }
}
