// src/core/session/handle.rs

use super::SessionId;
use crate::core::errors::BridgeError;
use tokio::sync::mpsc;

/// The producer side of a session, as stored in the registry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    generation: u64,
    inbound: mpsc::UnboundedSender<String>,
    errors: mpsc::Sender<BridgeError>,
}

/// The consumer side, owned by the session's control loop.
#[derive(Debug)]
pub(super) struct SessionInbox {
    pub(super) inbound: mpsc::UnboundedReceiver<String>,
    pub(super) errors: mpsc::Receiver<BridgeError>,
}

impl SessionHandle {
    pub(super) fn new(id: SessionId, generation: u64) -> (Self, SessionInbox) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        // A single slot: only the first client error matters.
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let handle = Self {
            id,
            generation,
            inbound: inbound_tx,
            errors: errors_tx,
        };
        let inbox = SessionInbox {
            inbound: inbound_rx,
            errors: errors_rx,
        };
        (handle, inbox)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Distinguishes this incarnation from any later session registered under the same id.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Enqueues a client message. Never blocks.
    pub fn send(&self, message: String) -> Result<(), BridgeError> {
        self.inbound
            .send(message)
            .map_err(|_| BridgeError::SessionNotFound(self.id))
    }

    /// Signals a terminal client-side error. Never blocks; only the first
    /// error is kept, later ones are dropped.
    pub fn fail(&self, err: BridgeError) -> Result<(), BridgeError> {
        match self.errors.try_send(err) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(BridgeError::SessionNotFound(self.id)),
        }
    }

    /// Returns true once the control loop has exited.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}
