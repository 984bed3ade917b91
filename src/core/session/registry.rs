// src/core/session/registry.rs

//! The concurrency-safe map from session id to live session.

use super::control_loop::SessionLoop;
use super::handle::SessionHandle;
use super::{ClientSink, SessionId};
use crate::config::BackendConfig;
use crate::core::backend::BackendConnector;
use crate::core::errors::BridgeError;
use crate::core::metrics;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Maps session ids to live sessions.
///
/// A session enters the map together with its control loop, which is spawned
/// under the per-key entry lock in [`get_or_create`]. It leaves when the loop
/// terminates and removes its own entry, or through [`remove`], which also
/// stops the loop.
///
/// [`get_or_create`]: SessionRegistry::get_or_create
/// [`remove`]: SessionRegistry::remove
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: DashMap<SessionId, SessionHandle>,
    backend: BackendConfig,
    client: Arc<dyn ClientSink>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new(backend: BackendConfig, client: Arc<dyn ClientSink>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                backend,
                client,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the live session for `id`, creating it (and dialing its
    /// backend) if there is none. Concurrent callers with the same id always
    /// observe the same session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_or_create(&self, id: SessionId) -> SessionHandle {
        match self.inner.sessions.entry(id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let (handle, inbox) = SessionHandle::new(id, generation);
                let backend = BackendConnector::spawn(&self.inner.backend, id);
                let session = SessionLoop::new(
                    id,
                    generation,
                    inbox,
                    backend,
                    self.inner.client.clone(),
                    self.clone(),
                );
                tokio::spawn(session.run());
                entry.insert(handle.clone());
                metrics::ACTIVE_SESSIONS.inc();
                info!(session_id = %id, backend = %self.inner.backend.address, "started session");
                handle
            }
        }
    }

    /// Looks up a session without creating one.
    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.inner.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Removes a session and stops its control loop, which closes the
    /// backend. Removing an absent id is a no-op.
    ///
    /// The loop is stopped through its error slot, so handles cloned elsewhere
    /// cannot keep it running outside the registry.
    pub fn remove(&self, id: SessionId) {
        if let Some((_, handle)) = self.inner.sessions.remove(&id) {
            let _ = handle.fail(BridgeError::ClientGone);
            metrics::ACTIVE_SESSIONS.dec();
            debug!(session_id = %id, "removed session");
        }
    }

    /// Removes the entry only if it still belongs to the given incarnation.
    pub(super) fn remove_generation(&self, id: SessionId, generation: u64) {
        if self
            .inner
            .sessions
            .remove_if(&id, |_, handle| handle.generation() == generation)
            .is_some()
        {
            metrics::ACTIVE_SESSIONS.dec();
            debug!(session_id = %id, "session removed itself from the registry");
        }
    }

    /// Forwards a client message to an existing session.
    pub fn send_to_session(&self, id: SessionId, message: String) -> Result<(), BridgeError> {
        self.get(id)
            .ok_or(BridgeError::SessionNotFound(id))?
            .send(message)
    }

    /// Reports a terminal client-side error to an existing session.
    pub fn error_to_session(&self, id: SessionId, err: BridgeError) -> Result<(), BridgeError> {
        self.get(id)
            .ok_or(BridgeError::SessionNotFound(id))?
            .fail(err)
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// A snapshot of the ids currently registered.
    pub fn ids(&self) -> Vec<SessionId> {
        self.inner
            .sessions
            .iter()
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.inner.backend
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.inner.sessions.len())
            .field("backend", &self.inner.backend.address)
            .finish()
    }
}
