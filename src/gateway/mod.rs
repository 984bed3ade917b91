// src/gateway/mod.rs

//! The client gateway: terminates WebSocket connections and binds each one to
//! a session.

mod connections;
mod handler;
mod routes;

pub use connections::{ClientChannels, ClientConnection, ClientConnections};
pub use handler::{serve_socket, terminate_line};
pub use routes::router;
