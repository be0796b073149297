//! Broker configuration, loaded once at boot from a YAML file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Where a queue keeps its buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Buffer lives in memory only.
    #[default]
    Memory,
    /// Buffer is mirrored to one JSON file per queue.
    Disk,
}

/// Delivery order of a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOrder {
    /// Strict insertion order.
    #[default]
    Fifo,
    /// Uniformly random pick on fetch.
    Unordered,
    /// Non-decreasing by sort criterion.
    Sorted,
}

/// Static configuration of one queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name; unique within the broker.
    pub name: String,
    /// Buffer durability.
    #[serde(default)]
    pub durability: Durability,
    /// Delivery order.
    #[serde(default)]
    pub order: DeliveryOrder,
    /// Message time-to-live in seconds.
    #[serde(default)]
    pub message_ttl: Option<u64>,
    /// Attribute consulted by sorted queues; created instant is the fallback.
    #[serde(default)]
    pub sort_key: Option<String>,
}

impl QueueConfig {
    /// Minimal in-memory FIFO queue config, mostly for tests.
    #[must_use]
    pub fn memory_fifo(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durability: Durability::Memory,
            order: DeliveryOrder::Fifo,
            message_ttl: None,
            sort_key: None,
        }
    }

    /// Configured TTL as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.message_ttl.map(Duration::from_secs)
    }
}

/// Top-level broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Every queue the broker serves.
    pub queues: Vec<QueueConfig>,
}

impl BrokerConfig {
    /// Load and validate a YAML configuration file.
    ///
    /// # Errors
    /// Fatal when the file is unreadable, the YAML lacks a `queues` sequence,
    /// the sequence is empty, or queue names collide.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the queue set.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an empty queue list or duplicate names.
    pub fn validate(&self) -> Result<()> {
        if self.queues.is_empty() {
            return Err(Error::Config("no queues defined in config".into()));
        }
        let mut seen = HashSet::new();
        for queue in &self.queues {
            if !seen.insert(queue.name.as_str()) {
                return Err(Error::Config(format!("duplicate queue name: {}", queue.name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_queue_entries() {
        let yaml = r"
queues:
  - name: tasks
    durability: disk
    order: sorted
    message_ttl: 30
    sort_key: priority
  - name: events
";
        let config: BrokerConfig = serde_yaml::from_str(yaml).expect("valid yaml");
        config.validate().expect("valid config");

        let tasks = &config.queues[0];
        assert_eq!(tasks.durability, Durability::Disk);
        assert_eq!(tasks.order, DeliveryOrder::Sorted);
        assert_eq!(tasks.ttl(), Some(Duration::from_secs(30)));
        assert_eq!(tasks.sort_key.as_deref(), Some("priority"));

        let events = &config.queues[1];
        assert_eq!(events.durability, Durability::Memory);
        assert_eq!(events.order, DeliveryOrder::Fifo);
        assert_eq!(events.ttl(), None);
    }

    #[test]
    fn missing_queues_is_fatal() {
        let parsed: std::result::Result<BrokerConfig, _> = serde_yaml::from_str("other: 1");
        assert!(parsed.is_err());

        let empty: BrokerConfig = serde_yaml::from_str("queues: []").expect("parses");
        assert!(empty.validate().is_err());
    }

    #[test]
    fn duplicate_queue_names_are_fatal() {
        let yaml = "queues:\n  - name: q\n  - name: q\n";
        let config: BrokerConfig = serde_yaml::from_str(yaml).expect("parses");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
