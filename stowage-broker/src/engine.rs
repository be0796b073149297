//! Broker engine: the single-threaded event loop.
//!
//! The engine owns every queue store and the session table outright. It
//! multiplexes two inbound channels (producers, consumers) with a periodic
//! sweep that expires stale messages and requeues timed-out deliveries.
//! There is no lock hierarchy because there is no second thread.

use crate::config::BrokerConfig;
use crate::error::Result;
use crate::message::Message;
use crate::queue::QueueStore;
use crate::session::{
    ConsumerQos, ConsumerSession, SessionTable, DEFAULT_ACK_TIMEOUT,
};
use crate::transport::Inbound;
use crate::wire::{ConsumerRequest, ProducerRequest, Reply};
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Runtime options for the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Directory holding one subdirectory per disk queue.
    pub storage_root: PathBuf,
    /// Period of the TTL/ack sweep; also bounds the poll timeout.
    pub sweep_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { storage_root: PathBuf::from("storage"), sweep_interval: Duration::from_secs(1) }
    }
}

/// The broker core. Sole owner and mutator of queues and sessions.
#[derive(Debug)]
pub struct BrokerEngine {
    queues: HashMap<String, QueueStore>,
    sessions: SessionTable,
    sweep_interval: Duration,
}

impl BrokerEngine {
    /// Build the engine, opening (and for disk queues, reloading) every
    /// configured queue store.
    ///
    /// # Errors
    /// Fatal on invalid configuration or unreadable storage directories.
    pub fn new(config: BrokerConfig, options: EngineOptions) -> Result<Self> {
        config.validate()?;
        let mut queues = HashMap::new();
        for queue_config in config.queues {
            let name = queue_config.name.clone();
            let store = QueueStore::open(queue_config, &options.storage_root)?;
            queues.insert(name, store);
        }
        info!(queues = queues.len(), "broker engine ready");
        Ok(Self { queues, sessions: SessionTable::new(), sweep_interval: options.sweep_interval })
    }

    /// Run until both inbound channels close.
    pub async fn run(
        mut self,
        mut producers: mpsc::Receiver<Inbound>,
        mut consumers: mpsc::Receiver<Inbound>,
    ) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut producers_open = true;
        let mut consumers_open = true;

        while producers_open || consumers_open {
            tokio::select! {
                inbound = producers.recv(), if producers_open => match inbound {
                    Some(inbound) => self.handle_producer(inbound),
                    None => producers_open = false,
                },
                inbound = consumers.recv(), if consumers_open => match inbound {
                    Some(inbound) => self.handle_consumer(inbound),
                    None => consumers_open = false,
                },
                _ = sweep.tick() => self.sweep(),
            }
        }
        info!("broker engine stopped");
    }

    /// Handle one producer frame and reply.
    fn handle_producer(&mut self, inbound: Inbound) {
        let reply = match serde_json::from_str::<ProducerRequest>(&inbound.body) {
            Err(_) => Reply::error("bad_request"),
            Ok(request) => match self.queues.get_mut(&request.queue) {
                None => Reply::error("queue_not_found"),
                Some(queue) => {
                    let wants_ack = request.wants_ack();
                    let message = Message::new(request.payload, queue.config().ttl());
                    let id = message.id;
                    match queue.enqueue(message) {
                        Err(err) => {
                            error!(queue = %request.queue, %err, "enqueue failed");
                            Reply::error("storage_failure")
                        }
                        Ok(()) => {
                            debug!(queue = %request.queue, %id, "message enqueued");
                            if wants_ack {
                                Reply::status("ok").with("message_id", id.to_string())
                            } else {
                                Reply::status("accepted")
                            }
                        }
                    }
                }
            },
        };
        let _ = inbound.reply.send(reply.to_json());
    }

    /// Handle one consumer frame. A mismatched ack deliberately sends no
    /// reply at all, so duplicate acks stay cheap for retrying clients.
    fn handle_consumer(&mut self, inbound: Inbound) {
        let Ok(request) = serde_json::from_str::<ConsumerRequest>(&inbound.body) else {
            let _ = inbound.reply.send(Reply::error("bad_request").to_json());
            return;
        };

        let reply = match request {
            ConsumerRequest::Subscribe { queue, qos, ack_timeout_ms } => {
                if self.queues.contains_key(&queue) {
                    let qos = ConsumerQos::parse(qos.as_deref());
                    let ack_timeout = ack_timeout_ms
                        .and_then(|raw| raw.parse::<u64>().ok())
                        .map_or(DEFAULT_ACK_TIMEOUT, Duration::from_millis);
                    self.sessions.subscribe(
                        inbound.client.clone(),
                        ConsumerSession::new(&queue, qos, ack_timeout),
                    );
                    debug!(client = %inbound.client, queue = %queue, "subscribed");
                    Reply::status("subscribed").with("queue", queue)
                } else {
                    Reply::error("queue_not_found")
                }
            }
            ConsumerRequest::Unsubscribe => {
                self.sessions.unsubscribe(&inbound.client);
                Reply::status("unsubscribed")
            }
            ConsumerRequest::Fetch => self.handle_fetch(&inbound.client),
            ConsumerRequest::Ack { message_id } => {
                let acked = self
                    .sessions
                    .get_mut(&inbound.client)
                    .is_some_and(|session| session.acknowledge(&message_id));
                if !acked {
                    // Silent drop: pending (if any) stays until its own
                    // deadline.
                    return;
                }
                Reply::status("acknowledged").with("message_id", message_id)
            }
        };
        let _ = inbound.reply.send(reply.to_json());
    }

    /// Deliver the next message for the client's session mode.
    fn handle_fetch(&mut self, client: &crate::session::ClientId) -> Reply {
        let Some(session) = self.sessions.get_mut(client) else {
            return Reply::error("not_subscribed");
        };
        let Some(queue) = self.queues.get_mut(&session.queue) else {
            return Reply::error("queue_not_found");
        };

        if session.qos.needs_ack() {
            // A fetch while a delivery is in flight redelivers the same
            // message with a fresh deadline: the unacked message must not
            // be lost and the session holds at most one pending delivery.
            if let Some(delivery) = session.pending.clone() {
                session.begin_delivery(delivery.message.clone());
                return ok_reply(&delivery.message);
            }
            match queue.fetch_for_ack() {
                Err(err) => {
                    error!(queue = %session.queue, %err, "fetch failed");
                    Reply::error("storage_failure")
                }
                Ok(None) => Reply::status("empty"),
                Ok(Some(message)) => {
                    session.begin_delivery(message.clone());
                    ok_reply(&message)
                }
            }
        } else {
            match queue.peek_at(session.cursor) {
                Some(message) => {
                    let reply = ok_reply(message);
                    session.cursor += 1;
                    reply
                }
                None => Reply::status("empty"),
            }
        }
    }

    /// Periodic pass: expire stale messages, requeue timed-out deliveries.
    fn sweep(&mut self) {
        for queue in self.queues.values_mut() {
            if let Err(err) = queue.cleanup_expired() {
                warn!(queue = %queue.config().name, %err, "sweep persist failed");
            }
        }

        let now = Utc::now();
        for (client, session) in self.sessions.iter_mut() {
            if !session.qos.needs_ack() || !session.delivery_timed_out(now) {
                continue;
            }
            if let Some(delivery) = session.pending.take() {
                warn!(
                    client = %client,
                    id = %delivery.message.id,
                    "ack deadline passed, requeueing"
                );
                if let Some(queue) = self.queues.get_mut(&session.queue) {
                    if let Err(err) = queue.requeue(delivery.message) {
                        error!(queue = %session.queue, %err, "requeue failed");
                    }
                }
            }
        }
    }

    /// Number of buffered messages in `queue`, if it exists.
    #[must_use]
    pub fn queue_len(&self, queue: &str) -> Option<usize> {
        self.queues.get(queue).map(QueueStore::len)
    }
}

fn ok_reply(message: &Message) -> Reply {
    Reply::status("ok")
        .with("message_id", message.id.to_string())
        .with("payload", message.payload.clone())
        .with("timestamp", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::session::ClientId;

    fn test_engine(sweep: Duration) -> BrokerEngine {
        let config = BrokerConfig { queues: vec![QueueConfig::memory_fifo("q")] };
        let options = EngineOptions {
            storage_root: std::env::temp_dir().join("stowage-engine-tests"),
            sweep_interval: sweep,
        };
        BrokerEngine::new(config, options).expect("engine boots")
    }

    fn roundtrip(
        engine: &mut BrokerEngine,
        producer: bool,
        client: &str,
        body: &str,
    ) -> Option<std::collections::BTreeMap<String, String>> {
        let (inbound, mut reply_rx) = Inbound::new(ClientId::new(client), body);
        if producer {
            engine.handle_producer(inbound);
        } else {
            engine.handle_consumer(inbound);
        }
        reply_rx
            .try_recv()
            .ok()
            .map(|raw| serde_json::from_str(&raw).expect("reply json"))
    }

    #[test]
    fn produce_fills_the_queue() {
        let mut engine = test_engine(Duration::from_secs(1));
        let reply = roundtrip(&mut engine, true, "p", r#"{"queue":"q","payload":"x"}"#)
            .expect("reply");
        assert_eq!(reply["status"], "accepted");
        assert_eq!(engine.queue_len("q"), Some(1));
        assert_eq!(engine.queue_len("ghost"), None);
    }

    #[test]
    fn sweep_requeues_timed_out_delivery() {
        let mut engine = test_engine(Duration::from_millis(10));
        roundtrip(&mut engine, true, "p", r#"{"queue":"q","payload":"x"}"#);
        roundtrip(
            &mut engine,
            false,
            "c",
            r#"{"action":"subscribe","queue":"q","qos":"require_ack","ack_timeout_ms":"1"}"#,
        );
        let fetched =
            roundtrip(&mut engine, false, "c", r#"{"action":"fetch"}"#).expect("reply");
        assert_eq!(fetched["status"], "ok");
        assert_eq!(engine.queue_len("q"), Some(0), "in-flight message left the buffer");

        std::thread::sleep(Duration::from_millis(5));
        engine.sweep();
        assert_eq!(engine.queue_len("q"), Some(1), "timed-out delivery requeued");
    }

    #[test]
    fn mismatched_ack_keeps_pending() {
        let mut engine = test_engine(Duration::from_secs(1));
        roundtrip(&mut engine, true, "p", r#"{"queue":"q","payload":"x"}"#);
        roundtrip(
            &mut engine,
            false,
            "c",
            r#"{"action":"subscribe","queue":"q","qos":"require_ack"}"#,
        );
        roundtrip(&mut engine, false, "c", r#"{"action":"fetch"}"#);

        let silent =
            roundtrip(&mut engine, false, "c", r#"{"action":"ack","message_id":"nope"}"#);
        assert!(silent.is_none());
        let session = engine.sessions.get_mut(&ClientId::new("c")).expect("session");
        assert!(session.pending.is_some(), "pending untouched by mismatched ack");
    }
}
