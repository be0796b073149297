//! Message type and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Mint a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A queued message: opaque payload plus delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique id, stable across requeues and persistence round-trips.
    pub id: MessageId,
    /// Opaque payload as it arrived on the wire.
    pub payload: String,
    /// Creation instant; the TTL and sort fallback are measured from it.
    pub created: DateTime<Utc>,
    /// Optional time-to-live.
    pub ttl: Option<Duration>,
    /// Extension attributes, consulted by sorted queues with a sort key.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Message {
    /// Create a message stamped with the current instant.
    #[must_use]
    pub fn new(payload: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            id: MessageId::new(),
            payload: payload.into(),
            created: Utc::now(),
            ttl,
            attributes: HashMap::new(),
        }
    }

    /// Attach an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// True once `created + ttl` lies in the past.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else { return false };
        now.signed_duration_since(self.created)
            .to_std()
            .is_ok_and(|age| age > ttl)
    }
}
