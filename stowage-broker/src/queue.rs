//! Per-queue message store with optional disk persistence.

use crate::config::{DeliveryOrder, Durability, QueueConfig};
use crate::error::Result;
use crate::message::{Message, MessageId};
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Disk image of one message, one JSON-array file per queue.
///
/// Only id, payload, creation time, and TTL survive the round-trip;
/// a `created` value that cannot be decoded is reset to load time.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedMessage {
    id: String,
    payload: String,
    created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_ms: Option<u64>,
}

impl From<&Message> for PersistedMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.to_string(),
            payload: message.payload.clone(),
            created: Some(message.created.timestamp_millis()),
            ttl_ms: message
                .ttl
                .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

impl PersistedMessage {
    fn into_message(self) -> Message {
        let created = self
            .created
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(Utc::now);
        Message {
            id: self.id.parse().unwrap_or_default(),
            payload: self.payload,
            created,
            ttl: self.ttl_ms.map(std::time::Duration::from_millis),
            attributes: std::collections::HashMap::new(),
        }
    }
}

/// Ordered message buffer for one configured queue.
///
/// The store is exclusively owned by the broker engine; all methods take
/// `&mut self` and persistence writes are synchronous.
#[derive(Debug)]
pub struct QueueStore {
    config: QueueConfig,
    messages: Vec<Message>,
    storage_file: Option<PathBuf>,
    rng: StdRng,
}

impl QueueStore {
    /// Open the store; a disk queue creates its directory under
    /// `storage_root` and reloads any persisted buffer.
    ///
    /// # Errors
    /// Propagates directory-creation failures for disk queues.
    pub fn open(config: QueueConfig, storage_root: &Path) -> Result<Self> {
        let storage_file = match config.durability {
            Durability::Memory => None,
            Durability::Disk => {
                let dir = storage_root.join(&config.name);
                std::fs::create_dir_all(&dir)?;
                Some(dir.join("messages.json"))
            }
        };
        let mut store = Self {
            config,
            messages: Vec::new(),
            storage_file,
            rng: StdRng::from_entropy(),
        };
        store.load_from_disk();
        Ok(store)
    }

    /// Queue configuration.
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Append a message, re-sorting and persisting as configured.
    ///
    /// # Errors
    /// Propagates persistence failures on disk queues.
    pub fn enqueue(&mut self, message: Message) -> Result<()> {
        self.messages.push(message);
        self.sort_if_needed();
        self.persist()
    }

    /// Remove and return one message for an ack-tracked delivery.
    ///
    /// Expired messages are swept first. Unordered queues pick a uniformly
    /// random element; FIFO and sorted queues pop the head.
    ///
    /// # Errors
    /// Propagates persistence failures on disk queues.
    pub fn fetch_for_ack(&mut self) -> Result<Option<Message>> {
        self.cleanup_expired()?;
        if self.messages.is_empty() {
            return Ok(None);
        }
        let index = match self.config.order {
            DeliveryOrder::Unordered => self.rng.gen_range(0..self.messages.len()),
            DeliveryOrder::Fifo | DeliveryOrder::Sorted => 0,
        };
        let message = self.messages.remove(index);
        self.persist()?;
        Ok(Some(message))
    }

    /// Return the message at `index` without removing it; no sweep runs,
    /// but an expired message is withheld.
    #[must_use]
    pub fn peek_at(&self, index: usize) -> Option<&Message> {
        self.messages
            .get(index)
            .filter(|message| !message.is_expired(Utc::now()))
    }

    /// Put a message back at the front of the buffer (ack timeout path).
    ///
    /// # Errors
    /// Propagates persistence failures on disk queues.
    pub fn requeue(&mut self, message: Message) -> Result<()> {
        debug!(queue = %self.config.name, id = %message.id, "requeueing message");
        self.messages.insert(0, message);
        self.sort_if_needed();
        self.persist()
    }

    /// Remove any message with the given id.
    ///
    /// # Errors
    /// Propagates persistence failures on disk queues.
    pub fn drop_message(&mut self, id: MessageId) -> Result<bool> {
        let before = self.messages.len();
        self.messages.retain(|message| message.id != id);
        if self.messages.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Remove every expired message; idempotent.
    ///
    /// # Errors
    /// Propagates persistence failures on disk queues.
    pub fn cleanup_expired(&mut self) -> Result<usize> {
        let now = Utc::now();
        let before = self.messages.len();
        self.messages.retain(|message| !message.is_expired(now));
        let removed = before - self.messages.len();
        if removed > 0 {
            debug!(queue = %self.config.name, removed, "expired messages swept");
            self.persist()?;
        }
        Ok(removed)
    }

    /// Number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when the buffer holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Buffer contents, in delivery order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Stable re-sort for sorted queues: by the configured attribute when
    /// both messages carry it, otherwise by creation instant.
    fn sort_if_needed(&mut self) {
        if self.config.order != DeliveryOrder::Sorted {
            return;
        }
        match self.config.sort_key.clone() {
            Some(key) => self.messages.sort_by(|a, b| {
                match (a.attributes.get(&key), b.attributes.get(&key)) {
                    (Some(left), Some(right)) => left.cmp(right),
                    _ => a.created.cmp(&b.created),
                }
            }),
            None => self.messages.sort_by_key(|message| message.created),
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.storage_file else {
            return Ok(());
        };
        let image: Vec<PersistedMessage> =
            self.messages.iter().map(PersistedMessage::from).collect();
        let encoded = serde_json::to_string_pretty(&image)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    fn load_from_disk(&mut self) {
        let Some(path) = &self.storage_file else {
            return;
        };
        let Ok(raw) = std::fs::read_to_string(path) else {
            return;
        };
        match serde_json::from_str::<Vec<PersistedMessage>>(&raw) {
            Ok(persisted) => {
                self.messages = persisted
                    .into_iter()
                    .map(PersistedMessage::into_message)
                    .collect();
                self.sort_if_needed();
                debug!(
                    queue = %self.config.name,
                    count = self.messages.len(),
                    "reloaded persisted messages"
                );
            }
            Err(err) => {
                warn!(queue = %self.config.name, %err, "unreadable persistence file, starting empty");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use std::time::Duration;

    fn memory_store(name: &str) -> QueueStore {
        QueueStore::open(QueueConfig::memory_fifo(name), Path::new("unused")).expect("open")
    }

    #[test]
    fn fifo_enqueue_then_fetch_roundtrip() {
        let mut store = memory_store("q");
        let message = Message::new("hello", None);
        let id = message.id;
        store.enqueue(message).expect("enqueue");

        let fetched = store.fetch_for_ack().expect("fetch").expect("one message");
        assert_eq!(fetched.id, id);
        assert!(store.fetch_for_ack().expect("fetch").is_none());
    }

    #[test]
    fn requeue_puts_message_back_at_the_front() {
        let mut store = memory_store("q");
        store.enqueue(Message::new("first", None)).expect("enqueue");
        store.enqueue(Message::new("second", None)).expect("enqueue");

        let first = store.fetch_for_ack().expect("fetch").expect("message");
        assert_eq!(first.payload, "first");
        store.requeue(first).expect("requeue");

        let again = store.fetch_for_ack().expect("fetch").expect("message");
        assert_eq!(again.payload, "first", "at-least-once redelivery order");
    }

    #[test]
    fn unordered_fetch_drains_every_message() {
        let config = QueueConfig {
            order: DeliveryOrder::Unordered,
            ..QueueConfig::memory_fifo("q")
        };
        let mut store = QueueStore::open(config, Path::new("unused")).expect("open");
        for index in 0..5 {
            store.enqueue(Message::new(format!("m{index}"), None)).expect("enqueue");
        }
        let mut seen = std::collections::HashSet::new();
        while let Some(message) = store.fetch_for_ack().expect("fetch") {
            seen.insert(message.payload);
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn sorted_queue_orders_by_attribute_with_created_fallback() {
        let config = QueueConfig {
            order: DeliveryOrder::Sorted,
            sort_key: Some("priority".into()),
            ..QueueConfig::memory_fifo("q")
        };
        let mut store = QueueStore::open(config, Path::new("unused")).expect("open");
        store
            .enqueue(Message::new("low", None).with_attribute("priority", "9"))
            .expect("enqueue");
        store
            .enqueue(Message::new("high", None).with_attribute("priority", "1"))
            .expect("enqueue");

        let payloads: Vec<_> =
            store.messages().iter().map(|message| message.payload.clone()).collect();
        assert_eq!(payloads, vec!["high", "low"]);
    }

    #[test]
    fn expired_messages_are_swept_and_withheld() {
        let mut store = memory_store("q");
        let mut expired = Message::new("old", Some(Duration::from_millis(1)));
        expired.created = Utc::now() - chrono::Duration::seconds(5);
        store.enqueue(expired).expect("enqueue");
        store.enqueue(Message::new("fresh", None)).expect("enqueue");

        assert!(store.peek_at(0).is_none(), "expired message is withheld");

        let fetched = store.fetch_for_ack().expect("fetch").expect("fresh survives");
        assert_eq!(fetched.payload, "fresh");
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut store = memory_store("q");
        let mut expired = Message::new("old", Some(Duration::from_millis(1)));
        expired.created = Utc::now() - chrono::Duration::seconds(5);
        store.enqueue(expired).expect("enqueue");

        assert_eq!(store.cleanup_expired().expect("sweep"), 1);
        assert_eq!(store.cleanup_expired().expect("sweep"), 0);
    }

    #[test]
    fn drop_removes_by_id() {
        let mut store = memory_store("q");
        let message = Message::new("x", None);
        let id = message.id;
        store.enqueue(message).expect("enqueue");

        assert!(store.drop_message(id).expect("drop"));
        assert!(!store.drop_message(id).expect("drop"));
        assert!(store.is_empty());
    }

    #[test]
    fn disk_queue_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = QueueConfig {
            durability: Durability::Disk,
            ..QueueConfig::memory_fifo("journal")
        };

        let id = {
            let mut store = QueueStore::open(config.clone(), dir.path()).expect("open");
            let message = Message::new("persisted", Some(Duration::from_secs(60)));
            let id = message.id;
            store.enqueue(message).expect("enqueue");
            id
        };

        // The file mirrors the buffer.
        let raw = std::fs::read_to_string(dir.path().join("journal/messages.json"))
            .expect("persistence file");
        let image: Vec<serde_json::Value> = serde_json::from_str(&raw).expect("json array");
        assert_eq!(image.len(), 1);
        assert_eq!(image[0]["payload"], "persisted");

        let store = QueueStore::open(config, dir.path()).expect("reopen");
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].id, id);
        assert_eq!(store.messages()[0].payload, "persisted");
    }

    #[test]
    fn undecodable_created_resets_to_load_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = QueueConfig {
            durability: Durability::Disk,
            ..QueueConfig::memory_fifo("journal")
        };
        std::fs::create_dir_all(dir.path().join("journal")).expect("mkdir");
        std::fs::write(
            dir.path().join("journal/messages.json"),
            r#"[{"id":"not-a-uuid","payload":"legacy","created":null}]"#,
        )
        .expect("seed file");

        let before = Utc::now();
        let store = QueueStore::open(config, dir.path()).expect("open");
        assert_eq!(store.len(), 1);
        assert!(store.messages()[0].created >= before, "created reset to now");
    }
}
