//! Consumer sessions and the session table.

use crate::message::Message;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Opaque client identity, minted by the transport per connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap an identity string.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consumer delivery mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsumerQos {
    /// Cursored reads, no ack obligation.
    #[default]
    FireAndForget,
    /// Messages leave the queue on fetch and must be acked.
    RequireAck,
    /// Like `RequireAck`; the session keeps a cursor for resumption.
    Resume,
}

impl ConsumerQos {
    /// Parse a wire string; unknown values fall back to fire-and-forget.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("require_ack") => Self::RequireAck,
            Some("resume") => Self::Resume,
            _ => Self::FireAndForget,
        }
    }

    /// True when fetched messages await an ack.
    #[must_use]
    pub fn needs_ack(self) -> bool {
        matches!(self, Self::RequireAck | Self::Resume)
    }
}

/// A message handed to a consumer but not yet acknowledged.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    /// The in-flight message; it is absent from the queue buffer.
    pub message: Message,
    /// Instant after which the sweep requeues the message.
    pub deadline: DateTime<Utc>,
}

/// Default ack timeout applied unless `subscribe` overrides it.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Per-consumer subscription state.
#[derive(Debug)]
pub struct ConsumerSession {
    /// Subscribed queue name; looked up on every dispatch.
    pub queue: String,
    /// Delivery mode.
    pub qos: ConsumerQos,
    /// Ack deadline distance for fetched messages.
    pub ack_timeout: Duration,
    /// Read cursor for cursored modes.
    pub cursor: usize,
    /// At most one in-flight delivery.
    pub pending: Option<PendingDelivery>,
}

impl ConsumerSession {
    /// Fresh session for `queue` with the given mode.
    #[must_use]
    pub fn new(queue: impl Into<String>, qos: ConsumerQos, ack_timeout: Duration) -> Self {
        Self { queue: queue.into(), qos, ack_timeout, cursor: 0, pending: None }
    }

    /// Move a fetched message into the pending slot with a fresh deadline.
    pub fn begin_delivery(&mut self, message: Message) {
        let deadline = Utc::now()
            + chrono::Duration::from_std(self.ack_timeout)
                .unwrap_or_else(|_| chrono::Duration::milliseconds(i64::MAX));
        self.pending = Some(PendingDelivery { message, deadline });
    }

    /// Clear the pending slot when `id` matches; returns whether it did.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        let matches = self
            .pending
            .as_ref()
            .is_some_and(|delivery| delivery.message.id.to_string() == id);
        if matches {
            self.pending = None;
        }
        matches
    }

    /// True when the pending delivery's deadline has passed.
    #[must_use]
    pub fn delivery_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.pending.as_ref().is_some_and(|delivery| now > delivery.deadline)
    }
}

/// All live sessions, keyed by client identity.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<ClientId, ConsumerSession>,
}

impl SessionTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the session for `client`.
    pub fn subscribe(&mut self, client: ClientId, session: ConsumerSession) {
        self.sessions.insert(client, session);
    }

    /// Drop the session for `client`.
    pub fn unsubscribe(&mut self, client: &ClientId) {
        self.sessions.remove(client);
    }

    /// Mutable access to a client's session.
    pub fn get_mut(&mut self, client: &ClientId) -> Option<&mut ConsumerSession> {
        self.sessions.get_mut(client)
    }

    /// Iterate every session mutably (sweep path).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ClientId, &mut ConsumerSession)> {
        self.sessions.iter_mut()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
