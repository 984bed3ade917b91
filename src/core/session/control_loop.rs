// src/core/session/control_loop.rs

//! The per-session control loop: the bridge between one client and one backend.

use super::handle::SessionInbox;
use super::registry::SessionRegistry;
use super::{ClientSink, SessionId};
use crate::core::backend::{BackendEvent, BackendLink};
use crate::core::errors::BridgeError;
use crate::core::metrics;
use bytes::Bytes;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// One ready event out of the four sources a session listens to.
#[derive(Debug)]
pub enum SessionEvent {
    /// A message from the client, already terminated, bound for the backend.
    ClientMessage(String),
    /// A chunk read from the backend, bound for the client.
    BackendMessage(Bytes),
    /// The backend connection ended or could not be established.
    BackendClosed(BridgeError),
    /// The client side failed or went away.
    ClientError(BridgeError),
}

/// Why a session ended.
#[derive(Debug)]
enum Teardown {
    Backend(BridgeError),
    Client(BridgeError),
}

impl Teardown {
    fn label(&self) -> &'static str {
        match self {
            Teardown::Backend(_) => "backend",
            Teardown::Client(_) => "client",
        }
    }

    fn error(&self) -> &BridgeError {
        match self {
            Teardown::Backend(e) | Teardown::Client(e) => e,
        }
    }
}

/// Owns everything a running session needs. Consumed by [`SessionLoop::run`].
pub struct SessionLoop {
    id: SessionId,
    generation: u64,
    inbox: SessionInbox,
    backend: BackendLink,
    client: Arc<dyn ClientSink>,
    registry: SessionRegistry,
    started: Instant,
}

impl SessionLoop {
    pub(super) fn new(
        id: SessionId,
        generation: u64,
        inbox: SessionInbox,
        backend: BackendLink,
        client: Arc<dyn ClientSink>,
        registry: SessionRegistry,
    ) -> Self {
        Self {
            id,
            generation,
            inbox,
            backend,
            client,
            registry,
            started: Instant::now(),
        }
    }

    /// Services one event at a time until a terminal event, then tears down.
    pub async fn run(mut self) {
        debug!(session_id = %self.id, "session control loop started");
        let cause = loop {
            let event = self.next_event().await;
            if let ControlFlow::Break(cause) = self.dispatch(event) {
                break cause;
            }
        };
        self.finish(cause);
    }

    /// Waits until any of the four sources is ready. No source has priority.
    async fn next_event(&mut self) -> SessionEvent {
        tokio::select! {
            message = self.inbox.inbound.recv() => match message {
                Some(message) => SessionEvent::ClientMessage(message),
                None => SessionEvent::ClientError(BridgeError::ClientGone),
            },
            event = self.backend.next_event() => match event {
                BackendEvent::Data(chunk) => SessionEvent::BackendMessage(chunk),
                BackendEvent::Closed(err) => SessionEvent::BackendClosed(err),
            },
            err = self.inbox.errors.recv() => {
                SessionEvent::ClientError(err.unwrap_or(BridgeError::ClientGone))
            }
        }
    }

    fn dispatch(&mut self, event: SessionEvent) -> ControlFlow<Teardown> {
        match event {
            SessionEvent::ClientMessage(message) => {
                trace!(session_id = %self.id, bytes = message.len(), "client -> backend");
                if let Err(e) = self.backend.send(message) {
                    return ControlFlow::Break(Teardown::Backend(e));
                }
                metrics::MESSAGES_TO_BACKEND_TOTAL.inc();
                ControlFlow::Continue(())
            }
            SessionEvent::BackendMessage(chunk) => {
                trace!(session_id = %self.id, bytes = chunk.len(), "backend -> client");
                self.client.send_to_client(self.id, chunk);
                metrics::MESSAGES_TO_CLIENT_TOTAL.inc();
                ControlFlow::Continue(())
            }
            SessionEvent::BackendClosed(err) => ControlFlow::Break(Teardown::Backend(err)),
            SessionEvent::ClientError(err) => ControlFlow::Break(Teardown::Client(err)),
        }
    }

    /// Releases both sides exactly once. Anything still queued is abandoned.
    fn finish(self, cause: Teardown) {
        match &cause {
            Teardown::Backend(_) => {
                // The gateway learns about backend failures only from us.
                self.client.cancel_client(self.id);
            }
            Teardown::Client(err) => {
                // The gateway is already tearing its side down.
                self.backend.close(err);
            }
        }
        self.registry.remove_generation(self.id, self.generation);

        metrics::SESSIONS_CLOSED_TOTAL
            .with_label_values(&[cause.label()])
            .inc();
        metrics::SESSION_DURATION_SECONDS.observe(self.started.elapsed().as_secs_f64());

        let err = cause.error();
        if err.is_normal_disconnect() {
            info!(session_id = %self.id, cause = cause.label(), "session ended: {}", err);
        } else {
            warn!(session_id = %self.id, cause = cause.label(), "session ended: {}", err);
        }
    }
}
