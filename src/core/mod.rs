// src/core/mod.rs

//! The central module containing the session bridge: sessions, their backend
//! connections, shared state, errors and metrics.

pub mod backend;
pub mod errors;
pub mod metrics;
pub mod session;
pub mod state;

pub use errors::BridgeError;
pub use session::{ClientSink, SessionId};
