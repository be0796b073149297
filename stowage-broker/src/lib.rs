//! # Stowage Broker
//!
//! Persistent message broker with per-queue storage policies, at-least-once
//! delivery via acknowledgements, TTL expiry, and per-consumer sessions.
//!
//! The broker core is a single-threaded event loop ([`engine::BrokerEngine`])
//! multiplexing producer and consumer request channels over a request/reply
//! transport. Each configured queue is backed by a [`queue::QueueStore`] that
//! optionally persists its buffer to disk as one JSON-array file.
//!
//! The transport layer is an external collaborator: anything able to deliver
//! [`transport::Inbound`] frames (an opaque client identity, a JSON body, and
//! a one-shot reply channel) can drive the engine. The bundled TCP frontend
//! speaks newline-delimited JSON on two endpoints, one for producers and one
//! for consumers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod queue;
pub mod session;
pub mod transport;
pub mod wire;

pub use config::{BrokerConfig, DeliveryOrder, Durability, QueueConfig};
pub use engine::{BrokerEngine, EngineOptions};
pub use error::{Error, Result};
pub use message::{Message, MessageId};

/// Re-export of the types most callers need.
pub mod prelude {
    pub use crate::config::{BrokerConfig, DeliveryOrder, Durability, QueueConfig};
    pub use crate::engine::{BrokerEngine, EngineOptions};
    pub use crate::error::{Error, Result};
    pub use crate::message::{Message, MessageId};
    pub use crate::session::{ClientId, ConsumerQos};
    pub use crate::transport::Inbound;
}
