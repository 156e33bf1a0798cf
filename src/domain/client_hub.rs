//! Process-wide registry of live connections with sender-excluding fan-out.
//!
//! [`ClientHub`] is a cheap, cloneable handle onto a single coordinator
//! task. The coordinator exclusively owns the membership map; register,
//! unregister and broadcast requests are messages queued to it and handled
//! one at a time, so the map needs no lock and requests from one submitter
//! are applied in submission order.

use std::collections::HashMap;

use axum::extract::ws::{Message, Utf8Bytes};
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;

use super::ConnectionId;

/// Queue feeding one connection's writer task.
pub type OutboundSender = mpsc::Sender<Message>;

/// A payload to fan out, tagged with the connection it came from.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// Text delivered verbatim to every other member.
    pub payload: Utf8Bytes,
    /// Sender, excluded from delivery.
    pub sender: ConnectionId,
}

#[derive(Debug)]
enum HubRequest {
    Register {
        id: ConnectionId,
        outbound: OutboundSender,
    },
    Unregister(ConnectionId),
    Broadcast(BroadcastMessage),
    ClientCount(oneshot::Sender<usize>),
}

/// Handle onto the hub coordinator.
///
/// Created once at startup with [`ClientHub::spawn`] and cloned into every
/// connection handler.
#[derive(Debug, Clone)]
pub struct ClientHub {
    requests: mpsc::Sender<HubRequest>,
}

impl ClientHub {
    /// Spawns the coordinator task and returns a handle to it.
    ///
    /// `capacity` bounds the number of queued requests; submitters wait when
    /// it is reached. The coordinator stops once every handle is dropped.
    #[must_use]
    pub fn spawn(capacity: usize) -> Self {
        let (requests, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_coordinator(rx));
        Self { requests }
    }

    /// Adds a connection. Registering an existing id replaces its queue.
    pub async fn register(&self, id: ConnectionId, outbound: OutboundSender) {
        self.submit(HubRequest::Register { id, outbound }).await;
    }

    /// Removes a connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: ConnectionId) {
        self.submit(HubRequest::Unregister(id)).await;
    }

    /// Delivers `payload` to every registered connection except `sender`.
    pub async fn broadcast(&self, payload: impl Into<String>, sender: ConnectionId) {
        let message = BroadcastMessage {
            payload: Utf8Bytes::from(payload.into()),
            sender,
        };
        self.submit(HubRequest::Broadcast(message)).await;
    }

    /// Number of registered connections, as seen after every request
    /// submitted before this one. Returns 0 if the coordinator is gone.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.submit(HubRequest::ClientCount(tx)).await;
        rx.await.unwrap_or(0)
    }

    async fn submit(&self, request: HubRequest) {
        if self.requests.send(request).await.is_err() {
            tracing::error!("client hub coordinator is not running");
        }
    }
}

async fn run_coordinator(mut requests: mpsc::Receiver<HubRequest>) {
    let mut clients: HashMap<ConnectionId, OutboundSender> = HashMap::new();

    while let Some(request) = requests.recv().await {
        match request {
            HubRequest::Register { id, outbound } => {
                clients.insert(id, outbound);
                tracing::info!(conn_id = %id, total = clients.len(), "client registered");
            }
            HubRequest::Unregister(id) => {
                if clients.remove(&id).is_some() {
                    tracing::info!(conn_id = %id, total = clients.len(), "client unregistered");
                }
            }
            HubRequest::Broadcast(message) => {
                let delivered = fan_out(&clients, &message);
                tracing::debug!(
                    sender = %message.sender,
                    delivered,
                    "broadcast delivered"
                );
            }
            HubRequest::ClientCount(reply) => {
                let _ = reply.send(clients.len());
            }
        }
    }

    tracing::debug!("client hub coordinator stopped");
}

/// Queues the payload on every member but the sender without waiting.
/// A full or closed queue is logged and skipped.
fn fan_out(clients: &HashMap<ConnectionId, OutboundSender>, message: &BroadcastMessage) -> usize {
    let mut delivered = 0;
    for (id, outbound) in clients {
        if *id == message.sender {
            continue;
        }
        match outbound.try_send(Message::Text(message.payload.clone())) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %id, "error broadcasting to client: outbound queue full");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(conn_id = %id, "error broadcasting to client: connection closed");
            }
        }
    }
    delivered
}
