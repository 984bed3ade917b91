// src/core/backend/mod.rs

//! The backend side of a session: one raw TCP text-protocol connection,
//! exposed as an outbound sink, an inbound source and a one-shot terminal
//! error signal.

mod connector;

pub use connector::{BackendConnector, BackendEvent, BackendLink};
