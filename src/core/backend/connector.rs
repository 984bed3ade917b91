// src/core/backend/connector.rs

//! Dials the backend for one session and pumps its socket in both directions.

use crate::config::BackendConfig;
use crate::core::errors::BridgeError;
use crate::core::metrics;
use crate::core::session::SessionId;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How many backend chunks may wait for the control loop before the reader
/// stops pulling from the socket.
const INBOUND_CAPACITY: usize = 64;

/// Spawns backend connections. Each call to [`BackendConnector::spawn`] owns
/// exactly one socket for the lifetime of the returned [`BackendLink`].
pub struct BackendConnector;

impl BackendConnector {
    /// Starts dialing the backend in the background and returns immediately.
    ///
    /// Messages sent on the link before the dial completes are queued and
    /// written in order once the socket is up. A dial failure is reported
    /// through [`BackendLink::next_event`] like any other terminal error.
    pub fn spawn(config: &BackendConfig, session_id: SessionId) -> BackendLink {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (closed_tx, closed_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let task = ConnectorTask {
            session_id,
            addr: config.address.clone(),
            connect_timeout: config.connect_timeout,
            outbound: outbound_rx,
            inbound: inbound_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(async move {
            if let Some(err) = task.run().await {
                // The receiver may already be gone if the session closed us first.
                let _ = closed_tx.send(err);
            }
        });

        BackendLink {
            session_id,
            outbound: outbound_tx,
            inbound: inbound_rx,
            closed: Some(closed_rx),
            cancel,
        }
    }
}

/// What a backend connection produced.
#[derive(Debug, PartialEq)]
pub enum BackendEvent {
    /// A chunk of bytes exactly as read from the socket.
    Data(Bytes),
    /// The connection ended; no more events follow.
    Closed(BridgeError),
}

/// The session's exclusive handle to its backend connection.
///
/// Dropping the link closes the backend socket.
#[derive(Debug)]
pub struct BackendLink {
    session_id: SessionId,
    outbound: mpsc::UnboundedSender<Bytes>,
    inbound: mpsc::Receiver<Bytes>,
    closed: Option<oneshot::Receiver<BridgeError>>,
    cancel: CancellationToken,
}

impl BackendLink {
    /// Queues a message for the backend. Fails only once the connector has stopped.
    pub fn send(&self, message: impl Into<Bytes>) -> Result<(), BridgeError> {
        if self.cancel.is_cancelled() {
            return Err(BridgeError::BackendGone);
        }
        self.outbound
            .send(message.into())
            .map_err(|_| BridgeError::BackendGone)
    }

    /// Waits for the next thing the backend has to say.
    ///
    /// Chunks already read are always delivered before the terminal
    /// [`BackendEvent::Closed`], which is yielded exactly once; after it,
    /// the returned future never completes.
    pub async fn next_event(&mut self) -> BackendEvent {
        tokio::select! {
            biased;
            Some(chunk) = self.inbound.recv() => BackendEvent::Data(chunk),
            err = Self::closed(&mut self.closed) => BackendEvent::Closed(err),
        }
    }

    async fn closed(slot: &mut Option<oneshot::Receiver<BridgeError>>) -> BridgeError {
        let Some(rx) = slot.as_mut() else {
            return std::future::pending().await;
        };
        let result = rx.await;
        *slot = None;
        result.unwrap_or(BridgeError::BackendGone)
    }

    /// Closes the backend socket because the client side failed.
    pub fn close(&self, reason: &BridgeError) {
        debug!(
            session_id = %self.session_id,
            reason = %reason,
            "closing backend connection"
        );
        self.cancel.cancel();
    }
}

impl Drop for BackendLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ConnectorTask {
    session_id: SessionId,
    addr: String,
    connect_timeout: Duration,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    inbound: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

impl ConnectorTask {
    /// Runs until the socket fails or the link is closed. Returns the error to
    /// report, or `None` when the session itself asked for the shutdown.
    async fn run(mut self) -> Option<BridgeError> {
        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(session_id = %self.session_id, "backend dial abandoned");
                return None;
            }
            res = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)) => {
                match res {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        metrics::BACKEND_DIAL_FAILURES_TOTAL.inc();
                        warn!(session_id = %self.session_id, backend = %self.addr, "backend dial failed: {}", e);
                        return Some(BridgeError::BackendConnect {
                            addr: self.addr.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(_) => {
                        metrics::BACKEND_DIAL_FAILURES_TOTAL.inc();
                        warn!(session_id = %self.session_id, backend = %self.addr, "backend dial timed out");
                        return Some(BridgeError::BackendConnectTimeout(self.addr.clone()));
                    }
                }
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(session_id = %self.session_id, "failed to set TCP_NODELAY: {}", e);
        }
        info!(session_id = %self.session_id, backend = %self.addr, "backend connected");

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, BytesCodec::new());
        let mut writer = FramedWrite::new(write_half, BytesCodec::new());
        let outbound = &mut self.outbound;
        let inbound = &self.inbound;

        let read_side = async {
            loop {
                match reader.next().await {
                    Some(Ok(chunk)) => {
                        if inbound.send(chunk.freeze()).await.is_err() {
                            // The link was dropped; nobody is left to tell.
                            return None;
                        }
                    }
                    Some(Err(e)) => return Some(BridgeError::from(e)),
                    None => return Some(BridgeError::BackendClosed),
                }
            }
        };

        let write_side = async {
            while let Some(message) = outbound.recv().await {
                if let Err(e) = writer.send(message).await {
                    return Some(BridgeError::from(e));
                }
            }
            None
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            err = write_side => err,
            err = read_side => err,
        };

        match &outcome {
            Some(err) if err.is_normal_disconnect() => {
                info!(session_id = %self.session_id, "backend disconnected: {}", err)
            }
            Some(err) => warn!(session_id = %self.session_id, "backend connection failed: {}", err),
            None => debug!(session_id = %self.session_id, "backend connection closed by session"),
        }
        // Only one of the two sides can report; stop the other before returning.
        self.cancel.cancel();
        outcome
    }
}
