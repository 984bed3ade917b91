// src/core/metrics.rs

//! Defines and registers Prometheus metrics for gateway monitoring.
//!
//! Metrics are registered lazily through `lazy_static`, once for the whole
//! process, no matter how many registries or gateways a process constructs.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    // --- Gauges ---
    /// The number of sessions currently present in the registry.
    pub static ref ACTIVE_SESSIONS: Gauge =
        register_gauge!("mudbridge_active_sessions", "Number of live bridge sessions.").unwrap();
    /// The number of WebSocket clients currently attached.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("mudbridge_connected_clients", "Number of currently connected WebSocket clients.").unwrap();

    // --- Counters ---
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("mudbridge_connections_received_total", "Total number of WebSocket connections upgraded.").unwrap();
    pub static ref MESSAGES_TO_BACKEND_TOTAL: Counter =
        register_counter!("mudbridge_messages_to_backend_total", "Total number of client messages forwarded to backends.").unwrap();
    pub static ref MESSAGES_TO_CLIENT_TOTAL: Counter =
        register_counter!("mudbridge_messages_to_client_total", "Total number of backend chunks forwarded to clients.").unwrap();
    pub static ref BACKEND_DIAL_FAILURES_TOTAL: Counter =
        register_counter!("mudbridge_backend_dial_failures_total", "Total number of failed backend dials.").unwrap();
    /// Closed sessions, labeled by the side that ended them (`backend` or `client`).
    pub static ref SESSIONS_CLOSED_TOTAL: CounterVec =
        register_counter_vec!("mudbridge_sessions_closed_total", "Total number of sessions torn down, labeled by cause.", &["reason"]).unwrap();

    // --- Histograms ---
    /// How long sessions stay alive, from registration to teardown.
    pub static ref SESSION_DURATION_SECONDS: Histogram =
        register_histogram!("mudbridge_session_duration_seconds", "Lifetime of bridge sessions in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
