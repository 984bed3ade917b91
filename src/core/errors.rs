// src/core/errors.rs

//! Defines the primary error type for the session bridge.

use crate::core::session::SessionId;
use std::sync::Arc;
use thiserror::Error;

/// Every failure a session can observe on either side of the bridge.
///
/// The enum is `Clone` so that a single terminal error can be logged by the
/// component that observed it and still be forwarded to the other side.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Failed to connect to backend {addr}: {reason}")]
    BackendConnect { addr: String, reason: String },

    #[error("Timed out connecting to backend {0}")]
    BackendConnectTimeout(String),

    #[error("Backend closed the connection")]
    BackendClosed,

    /// The connector task went away without reporting why.
    #[error("Backend connector stopped unexpectedly")]
    BackendGone,

    #[error("Client read error: {0}")]
    ClientRead(String),

    #[error("Client write error: {0}")]
    ClientWrite(String),

    #[error("Client closed the connection")]
    ClientClosed,

    #[error("Client did not send a frame within the read deadline")]
    ClientTimeout,

    /// Every producer feeding the session has been dropped.
    #[error("Client side of the session is gone")]
    ClientGone,

    #[error("No session with id {0}")]
    SessionNotFound(SessionId),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Returns true for errors that represent an ordinary hang-up rather than a fault.
    pub fn is_normal_disconnect(&self) -> bool {
        match self {
            BridgeError::BackendClosed | BridgeError::ClientClosed | BridgeError::ClientGone => {
                true
            }
            BridgeError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

impl PartialEq for BridgeError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BridgeError::Io(e1), BridgeError::Io(e2)) => e1.kind() == e2.kind(),
            (
                BridgeError::BackendConnect { addr: a1, .. },
                BridgeError::BackendConnect { addr: a2, .. },
            ) => a1 == a2,
            (BridgeError::BackendConnectTimeout(a1), BridgeError::BackendConnectTimeout(a2)) => {
                a1 == a2
            }
            (BridgeError::ClientRead(s1), BridgeError::ClientRead(s2)) => s1 == s2,
            (BridgeError::ClientWrite(s1), BridgeError::ClientWrite(s2)) => s1 == s2,
            (BridgeError::SessionNotFound(id1), BridgeError::SessionNotFound(id2)) => id1 == id2,
            (BridgeError::Internal(s1), BridgeError::Internal(s2)) => s1 == s2,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(Arc::new(e))
    }
}

impl From<axum::Error> for BridgeError {
    fn from(e: axum::Error) -> Self {
        BridgeError::ClientRead(e.to_string())
    }
}
