// src/gateway/handler.rs

//! Runs one upgraded WebSocket: a reader feeding the session, a writer that
//! exclusively owns the socket's write side, and a keepalive pinger.

use crate::core::errors::BridgeError;
use crate::core::session::SessionId;
use crate::core::state::ServerState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Appends the backend line terminator to a client message.
pub fn terminate_line(mut message: String) -> String {
    message.push('\n');
    message
}

/// Drives an upgraded socket until both of its sides are done.
pub async fn serve_socket(socket: WebSocket, state: Arc<ServerState>) {
    let id = SessionId::new();
    state.stats.increment_total_connections();
    crate::core::metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
    info!(session_id = %id, "adding new connection");

    // The client must be reachable before the session can produce output for it.
    let channels = state.clients.register(id);
    state.sessions.get_or_create(id);

    let settings = &state.config.websocket;
    let (sink, stream) = socket.split();
    // `reader_done` ends the writer's close grace period early; `force_close`
    // is fired by the writer once it has given up on the peer.
    let reader_done = CancellationToken::new();
    let force_close = CancellationToken::new();
    let (ping_tx, ping_rx) = mpsc::channel(1);

    let writer = ClientWriter {
        id,
        sink,
        outbound: channels.outbound,
        pings: ping_rx,
        cancel: channels.cancel.clone(),
        reader_done: reader_done.clone(),
        force_close: force_close.clone(),
        write_wait: settings.write_wait,
        close_grace_period: settings.close_grace_period,
    };
    tokio::spawn(writer.run());
    tokio::spawn(keepalive(
        id,
        settings.ping_period,
        ping_tx,
        channels.cancel.clone(),
    ));

    let reader = ClientReader {
        id,
        stream,
        state: state.clone(),
        pong_wait: settings.pong_wait,
        force_close,
    };
    let err = reader.run().await;
    reader_done.cancel();

    if err.is_normal_disconnect() {
        info!(session_id = %id, "client disconnected: {}", err);
    } else {
        warn!(session_id = %id, "receive error: {}", err);
    }
    if let Err(e) = state.sessions.error_to_session(id, err) {
        debug!(session_id = %id, "session already gone: {}", e);
    }
    state.clients.release(id);
}

/// Owns the read half. Reads one frame at a time, each within `pong_wait`.
struct ClientReader {
    id: SessionId,
    stream: SplitStream<WebSocket>,
    state: Arc<ServerState>,
    pong_wait: Duration,
    force_close: CancellationToken,
}

impl ClientReader {
    /// Returns the error that ended reading. Never returns while the client is healthy.
    async fn run(mut self) -> BridgeError {
        loop {
            let next = tokio::select! {
                _ = self.force_close.cancelled() => return BridgeError::ClientClosed,
                next = tokio::time::timeout(self.pong_wait, self.stream.next()) => next,
            };
            let message = match next {
                Err(_) => return BridgeError::ClientTimeout,
                Ok(None) => return BridgeError::ClientClosed,
                Ok(Some(Err(e))) => return BridgeError::from(e),
                Ok(Some(Ok(message))) => message,
            };

            let text = match message {
                Message::Text(text) => text.as_str().to_owned(),
                Message::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
                // Any frame from the peer proves liveness; the deadline restarts.
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    debug!(
                        session_id = %self.id,
                        reason = ?frame.map(|f| f.reason.as_str().to_owned()),
                        "client sent close frame"
                    );
                    return BridgeError::ClientClosed;
                }
            };

            debug!(session_id = %self.id, bytes = text.len(), "received");
            if let Err(e) = self.state.sessions.send_to_session(self.id, terminate_line(text)) {
                return e;
            }
            self.state.stats.increment_client_messages();
        }
    }
}

/// Owns the write half exclusively; every frame to the client goes through it.
struct ClientWriter {
    id: SessionId,
    sink: SplitSink<WebSocket, Message>,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    pings: mpsc::Receiver<()>,
    cancel: CancellationToken,
    reader_done: CancellationToken,
    force_close: CancellationToken,
    write_wait: Duration,
    close_grace_period: Duration,
}

impl ClientWriter {
    async fn run(mut self) {
        let mut healthy = true;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(body) = self.outbound.recv() => {
                    if let Err(e) = self.write_text(body).await {
                        warn!(session_id = %self.id, "write error: {}", e);
                        healthy = false;
                        self.cancel.cancel();
                    }
                }
                Some(()) = self.pings.recv() => {
                    if let Err(e) = self.write(Message::Ping(Bytes::new())).await {
                        warn!(session_id = %self.id, "ping: {}", e);
                        healthy = false;
                        self.cancel.cancel();
                    }
                }
            }
        }
        if healthy {
            self.flush_pending().await;
        }
        self.shutdown().await;
    }

    /// Writes output that was queued before the cancellation, such as a
    /// backend's last words before it hung up.
    async fn flush_pending(&mut self) {
        while let Ok(body) = self.outbound.try_recv() {
            if let Err(e) = self.write_text(body).await {
                debug!(session_id = %self.id, "pending output not delivered: {}", e);
                return;
            }
        }
    }

    async fn write_text(&mut self, body: Bytes) -> Result<(), BridgeError> {
        let text = String::from_utf8_lossy(&body).into_owned();
        self.write(Message::Text(text.into())).await
    }

    async fn write(&mut self, message: Message) -> Result<(), BridgeError> {
        match tokio::time::timeout(self.write_wait, self.sink.send(message)).await {
            Ok(result) => result.map_err(|e| BridgeError::ClientWrite(e.to_string())),
            Err(_) => Err(BridgeError::from(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "write deadline exceeded",
            ))),
        }
    }

    /// Sends one close frame, gives the peer the grace period to answer, then
    /// forces the socket closed.
    async fn shutdown(mut self) {
        debug!(session_id = %self.id, "closing send channel");
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        };
        if let Err(e) = self.write(Message::Close(Some(frame))).await {
            debug!(session_id = %self.id, "close frame not delivered: {}", e);
        }
        if !self.reader_done.is_cancelled() {
            tokio::select! {
                _ = tokio::time::sleep(self.close_grace_period) => {
                    debug!(session_id = %self.id, "close grace period elapsed; forcing close");
                }
                _ = self.reader_done.cancelled() => {}
            }
        }
        self.force_close.cancel();
        let _ = self.sink.close().await;
    }
}

/// Asks the writer for a ping every `period` until the connection is cancelled.
async fn keepalive(
    id: SessionId,
    period: Duration,
    pings: mpsc::Sender<()>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if let Err(mpsc::error::TrySendError::Closed(_)) = pings.try_send(()) {
                    debug!(session_id = %id, "writer gone; keepalive stopping");
                    return;
                }
            }
        }
    }
}
