// src/core/state/stats.rs

//! Contains state definitions and logic for server statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds server-wide counters that outlive individual sessions.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of WebSocket connections accepted since startup.
    total_connections: AtomicU64,
    /// The total number of client messages handed to a session since startup.
    total_client_messages: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            total_client_messages: AtomicU64::new(0),
        }
    }

    /// Atomically increments the total number of connections received.
    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn increment_client_messages(&self) {
        self.total_client_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_client_messages(&self) -> u64 {
        self.total_client_messages.load(Ordering::Relaxed)
    }
}
