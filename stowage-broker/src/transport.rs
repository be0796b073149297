//! Request/reply transport feeding the engine.
//!
//! The engine only ever sees [`Inbound`] values: an opaque client identity,
//! a raw JSON body, and a one-shot reply channel. Anything able to produce
//! those can replace the bundled TCP frontend, which speaks newline-delimited
//! JSON and mints one identity per connection.

use crate::error::{Error, Result};
use crate::session::ClientId;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One request as the engine consumes it.
#[derive(Debug)]
pub struct Inbound {
    /// Opaque identity of the requesting client.
    pub client: ClientId,
    /// Raw JSON request body.
    pub body: String,
    /// Reply channel; dropping it sends nothing back.
    pub reply: oneshot::Sender<String>,
}

impl Inbound {
    /// Pair a request with its reply receiver (used by tests and frontends).
    #[must_use]
    pub fn new(client: ClientId, body: impl Into<String>) -> (Self, oneshot::Receiver<String>) {
        let (reply, reply_rx) = oneshot::channel();
        (Self { client, body: body.into(), reply }, reply_rx)
    }
}

/// Accept connections on `addr` and forward frames to the engine channel.
///
/// Connection tasks are tracked in a [`tokio::task::JoinSet`]; signalling
/// `shutdown` stops the accept loop and aborts every live connection, which
/// drops their clones of the inbound sender so the engine can drain and
/// exit.
///
/// # Errors
/// Returns [`Error::Transport`] when the endpoint cannot be bound.
pub async fn serve(
    role: &'static str,
    addr: SocketAddr,
    requests: mpsc::Sender<Inbound>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| Error::Transport(format!("bind {addr} failed: {err}")))?;
    info!(role, %addr, "endpoint listening");

    let mut connections = tokio::task::JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(role, %peer, "client connected");
                    connections.spawn(handle_client(role, stream, requests.clone()));
                }
                Err(err) => {
                    warn!(role, %err, "accept failed");
                }
            },
            // Reap finished connection tasks so the set stays small.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown.recv() => {
                info!(role, connections = connections.len(), "endpoint shutting down");
                connections.shutdown().await;
                return Ok(());
            }
        }
    }
}

/// Per-connection loop: one line in, at most one line out.
async fn handle_client(role: &'static str, stream: TcpStream, requests: mpsc::Sender<Inbound>) {
    let client = ClientId::new(format!("{role}-{}", Uuid::new_v4()));
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let (inbound, reply_rx) = Inbound::new(client.clone(), line);
        if requests.send(inbound).await.is_err() {
            // Engine is gone; drop the connection.
            return;
        }
        // A dropped reply sender means the engine intentionally stayed
        // silent (mismatched ack); the client just gets no line back.
        if let Ok(reply) = reply_rx.await {
            if writer.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
        }
    }
    debug!(client = %client, "client disconnected");
}
