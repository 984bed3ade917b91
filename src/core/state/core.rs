// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::stats::StatsState;
use crate::config::Config;
use crate::core::session::{ClientSink, SessionRegistry};
use crate::gateway::ClientConnections;
use std::sync::Arc;
use tracing::info;

/// The central struct holding all shared, server-wide state.
/// Wrapped in an `Arc` and handed to every route and connection task.
#[derive(Debug)]
pub struct ServerState {
    /// The configuration the server was started with. Immutable at runtime.
    pub config: Arc<Config>,
    /// Every live session, keyed by id.
    pub sessions: SessionRegistry,
    /// Every attached WebSocket client, keyed by the id it shares with its session.
    pub clients: Arc<ClientConnections>,
    pub stats: StatsState,
}

impl ServerState {
    /// Builds the shared state. The session registry reaches clients only
    /// through the `ClientSink` seam.
    pub fn new(config: Config) -> Arc<Self> {
        let clients = Arc::new(ClientConnections::new());
        let sink: Arc<dyn ClientSink> = clients.clone();
        let sessions = SessionRegistry::new(config.backend.clone(), sink);
        info!(
            "Sessions will dial backend at {} (connect timeout {:?})",
            config.backend.address, config.backend.connect_timeout
        );
        Arc::new(Self {
            config: Arc::new(config),
            sessions,
            clients,
            stats: StatsState::new(),
        })
    }
}
