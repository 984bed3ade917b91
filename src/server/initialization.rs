// src/server/initialization.rs

//! Binds the gateway listener and builds the shared server state.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let address = config.address.clone();
    let state = ServerState::new(config);
    info!("Server state initialized.");

    let listener = TcpListener::bind(address.as_str())
        .await
        .with_context(|| format!("Failed to bind gateway listener on {address}"))?;
    match listener.local_addr() {
        Ok(local) => {
            info!("mudbridge listening on http://{}", local);
            if !local.ip().is_loopback() {
                warn!(
                    "Gateway is bound to non-loopback address {}; every client gets its own backend connection.",
                    local
                );
            }
        }
        Err(_) => info!("mudbridge listening on http://{}", address),
    }

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

fn log_startup_info(config: &Config) {
    let ws = &config.websocket;
    info!(
        "WebSocket limits: max message {} bytes, write wait {:?}, pong wait {:?}, ping every {:?}.",
        ws.max_message_size, ws.write_wait, ws.pong_wait, ws.ping_period
    );
}
