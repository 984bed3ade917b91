// src/core/session/mod.rs

//! Sessions pair one WebSocket client with one backend connection.
//!
//! A session is represented by a cheap [`SessionHandle`] stored in the
//! [`SessionRegistry`], and by a control loop task that owns the backend link
//! and multiplexes the four event sources of the bridge.

mod control_loop;
mod handle;
mod registry;

pub use control_loop::{SessionEvent, SessionLoop};
pub use handle::SessionHandle;
pub use registry::SessionRegistry;

use std::fmt;
use uuid::Uuid;

/// Opaque identifier shared by a client connection and its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The calls a session makes back into the client gateway.
///
/// Implementations must be cheap and must never block: both methods are
/// invoked from inside a session's control loop.
pub trait ClientSink: Send + Sync + 'static {
    /// Queues a chunk of backend output for delivery to the client.
    fn send_to_client(&self, id: SessionId, body: bytes::Bytes);

    /// Cancels the client connection and releases its gateway bookkeeping.
    /// Calling it for an unknown or already cancelled id is a no-op.
    fn cancel_client(&self, id: SessionId);
}
