// src/server/connection_loop.rs

//! Contains the main serve loop and graceful shutdown.

use super::context::ServerContext;
use crate::core::state::ServerState;
use crate::gateway;
use anyhow::{Context, Result, anyhow};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

/// Serves the gateway until a signal arrives, a background task fails, or the
/// HTTP server itself stops.
pub async fn run(mut ctx: ServerContext) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    let app = gateway::router(ctx.state.clone());
    let mut http_shutdown_rx = ctx.shutdown_tx.subscribe();
    let mut http_server = tokio::spawn(async move {
        axum::serve(ctx.listener, app)
            .with_graceful_shutdown(async move {
                http_shutdown_rx.recv().await.ok();
            })
            .await
    });

    let mut outcome = Ok(());
    let mut http_server_done = false;
    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = &mut http_server => {
                http_server_done = true;
                outcome = match res {
                    Ok(Ok(())) => Err(anyhow!("HTTP server stopped unexpectedly")),
                    Ok(Err(e)) => Err(anyhow!(e).context("HTTP server failed")),
                    Err(e) => Err(anyhow!("HTTP server task panicked: {e:?}")),
                };
                break;
            }
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
    }

    // Every writer sends its close frame; sessions unwind as their readers finish.
    let open_clients = ctx.state.clients.len();
    ctx.state.clients.release_all();
    info!("Closing {} client connection(s).", open_clients);

    let grace = ctx.state.config.websocket.close_grace_period;
    if tokio::time::timeout(grace + Duration::from_secs(1), drain_sessions(&ctx.state))
        .await
        .is_err()
    {
        warn!(
            "{} session(s) still open after the close grace period.",
            ctx.state.sessions.len()
        );
    }

    if !http_server_done
        && tokio::time::timeout(Duration::from_secs(5), &mut http_server)
            .await
            .is_err()
    {
        warn!("Timed out waiting for the HTTP server to stop.");
        http_server.abort();
    }

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("Server shutdown complete.");
    outcome
}

/// Resolves once the session registry is empty.
async fn drain_sessions(state: &ServerState) {
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    while !state.sessions.is_empty() {
        ticker.tick().await;
    }
}
