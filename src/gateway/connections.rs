// src/gateway/connections.rs

//! Gateway-side bookkeeping for attached WebSocket clients.

use crate::core::metrics;
use crate::core::session::{ClientSink, SessionId};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What the gateway keeps for each attached client.
#[derive(Debug)]
pub struct ClientConnection {
    outbound: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
}

/// The receiving ends handed to a connection's writer task.
#[derive(Debug)]
pub struct ClientChannels {
    pub outbound: mpsc::UnboundedReceiver<Bytes>,
    pub cancel: CancellationToken,
}

/// All attached clients, keyed by the id they share with their session.
#[derive(Debug, Default)]
pub struct ClientConnections {
    connections: DashMap<SessionId, ClientConnection>,
}

impl ClientConnections {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a new client and returns the channels its writer drains.
    pub fn register(&self, id: SessionId) -> ClientChannels {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let connection = ClientConnection {
            outbound: outbound_tx,
            cancel: cancel.clone(),
        };
        if let Some(previous) = self.connections.insert(id, connection) {
            // Ids are random; a collision still must not leave a writer behind.
            previous.cancel.cancel();
        } else {
            metrics::CONNECTED_CLIENTS.inc();
        }
        ClientChannels {
            outbound: outbound_rx,
            cancel,
        }
    }

    /// Cancels the client's writer and keepalive and forgets the client.
    /// Releasing an unknown or already released id is a no-op.
    pub fn release(&self, id: SessionId) {
        if let Some((_, connection)) = self.connections.remove(&id) {
            connection.cancel.cancel();
            metrics::CONNECTED_CLIENTS.dec();
            debug!(session_id = %id, "released client connection");
        }
    }

    /// Cancels every attached client, e.g. on server shutdown.
    pub fn release_all(&self) {
        let ids: Vec<SessionId> = self.connections.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.release(id);
        }
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl ClientSink for ClientConnections {
    fn send_to_client(&self, id: SessionId, body: Bytes) {
        match self.connections.get(&id) {
            Some(connection) => {
                if connection.outbound.send(body).is_err() {
                    debug!(session_id = %id, "client writer already gone; dropping output");
                }
            }
            None => debug!(session_id = %id, "no client attached; dropping output"),
        }
    }

    fn cancel_client(&self, id: SessionId) {
        self.release(id);
    }
}
