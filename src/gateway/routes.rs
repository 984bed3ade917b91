// src/gateway/routes.rs

//! HTTP surface of the gateway: the landing page and the WebSocket upgrade.

use super::handler::serve_socket;
use crate::core::state::ServerState;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Router, routing::get};
use std::sync::Arc;
use tracing::warn;

/// Builds the gateway router. Any other path answers 404, other methods 405.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn home_handler(State(state): State<Arc<ServerState>>) -> Response {
    let path = &state.config.websocket.home_page;
    match tokio::fs::read_to_string(path).await {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            warn!("Failed to read landing page '{}': {}", path, e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

async fn ws_handler(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(state.config.websocket.max_message_size)
        .on_failed_upgrade(|e| warn!("upgrade: {}", e))
        .on_upgrade(move |socket| serve_socket(socket, state))
}
