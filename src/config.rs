// src/config.rs

//! Manages gateway configuration: loading, resolving derived values, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Where and how each session reaches its backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// The `host:port` every session dials.
    #[serde(default = "default_backend_address")]
    pub address: String,
    /// Upper bound on a single dial. A dial that takes longer ends the session.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: default_backend_address(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_backend_address() -> String {
    "127.0.0.1:4000".to_string()
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Timeouts and limits for the client-facing WebSocket transport.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebSocketConfig {
    /// Largest message accepted from a client, in bytes.
    pub max_message_size: usize,
    /// Time allowed to write one frame to a client.
    #[serde(with = "humantime_serde")]
    pub write_wait: Duration,
    /// Time allowed between two frames (including pongs) from a client.
    #[serde(with = "humantime_serde")]
    pub pong_wait: Duration,
    /// How often to ping clients. Must be shorter than `pong_wait`.
    #[serde(with = "humantime_serde")]
    pub ping_period: Duration,
    /// How long to wait after sending a close frame before dropping the socket.
    #[serde(with = "humantime_serde")]
    pub close_grace_period: Duration,
    /// The landing page served at `/`.
    pub home_page: String,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        let pong_wait = default_pong_wait();
        Self {
            max_message_size: default_max_message_size(),
            write_wait: default_write_wait(),
            pong_wait,
            ping_period: derived_ping_period(pong_wait),
            close_grace_period: default_close_grace_period(),
            home_page: default_home_page(),
        }
    }
}

/// The `[websocket]` table as written in the file; `ping_period` may be left out.
#[derive(Deserialize, Debug, Clone)]
struct RawWebSocketConfig {
    #[serde(default = "default_max_message_size")]
    max_message_size: usize,
    #[serde(with = "humantime_serde", default = "default_write_wait")]
    write_wait: Duration,
    #[serde(with = "humantime_serde", default = "default_pong_wait")]
    pong_wait: Duration,
    #[serde(with = "humantime_serde", default)]
    ping_period: Option<Duration>,
    #[serde(with = "humantime_serde", default = "default_close_grace_period")]
    close_grace_period: Duration,
    #[serde(default = "default_home_page")]
    home_page: String,
}

impl Default for RawWebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            write_wait: default_write_wait(),
            pong_wait: default_pong_wait(),
            ping_period: None,
            close_grace_period: default_close_grace_period(),
            home_page: default_home_page(),
        }
    }
}

impl From<RawWebSocketConfig> for WebSocketConfig {
    fn from(raw: RawWebSocketConfig) -> Self {
        Self {
            max_message_size: raw.max_message_size,
            write_wait: raw.write_wait,
            pong_wait: raw.pong_wait,
            ping_period: raw
                .ping_period
                .unwrap_or_else(|| derived_ping_period(raw.pong_wait)),
            close_grace_period: raw.close_grace_period,
            home_page: raw.home_page,
        }
    }
}

fn default_max_message_size() -> usize {
    8192
}
fn default_write_wait() -> Duration {
    Duration::from_secs(10)
}
fn default_pong_wait() -> Duration {
    Duration::from_secs(60)
}
fn default_close_grace_period() -> Duration {
    Duration::from_secs(10)
}
fn default_home_page() -> String {
    "static/home.html".to_string()
}

/// Pings go out at nine tenths of the pong deadline.
fn derived_ping_period(pong_wait: Duration) -> Duration {
    pong_wait * 9 / 10
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9464
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_address")]
    address: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    backend: BackendConfig,
    #[serde(default)]
    websocket: RawWebSocketConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Represents the final, validated, and resolved gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// The local address the WebSocket server binds to.
    pub address: String,
    pub log_level: String,
    pub backend: BackendConfig,
    pub websocket: WebSocketConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: default_log_level(),
            backend: BackendConfig::default(),
            websocket: WebSocketConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse configuration TOML")?;

        let config = Config {
            address: raw_config.address,
            log_level: raw_config.log_level,
            backend: raw_config.backend,
            websocket: raw_config.websocket.into(),
            metrics: raw_config.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Applies command-line or environment overrides on top of the loaded values.
    pub fn apply_overrides(&mut self, address: Option<String>, backend: Option<String>) {
        if let Some(address) = address {
            self.address = address;
        }
        if let Some(backend) = backend {
            self.backend.address = backend;
        }
    }

    /// The port of the bind address. The host part is resolved when binding,
    /// so names such as `localhost` are accepted.
    pub fn bind_port(&self) -> Result<u16> {
        validate_host_port(&self.address)
            .with_context(|| format!("invalid bind address '{}'", self.address))
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        let bind_port = self.bind_port()?;
        validate_host_port(&self.backend.address)
            .with_context(|| format!("invalid backend address '{}'", self.backend.address))?;
        if self.backend.connect_timeout.is_zero() {
            return Err(anyhow!("backend.connect_timeout cannot be 0"));
        }

        let ws = &self.websocket;
        if ws.max_message_size == 0 {
            return Err(anyhow!("websocket.max_message_size cannot be 0"));
        }
        for (name, value) in [
            ("write_wait", ws.write_wait),
            ("pong_wait", ws.pong_wait),
            ("ping_period", ws.ping_period),
            ("close_grace_period", ws.close_grace_period),
        ] {
            if value.is_zero() {
                return Err(anyhow!("websocket.{name} cannot be 0"));
            }
        }
        if ws.ping_period >= ws.pong_wait {
            return Err(anyhow!(
                "websocket.ping_period must be shorter than websocket.pong_wait"
            ));
        }
        if ws.home_page.trim().is_empty() {
            warn!("websocket.home_page is empty; '/' will answer 404.");
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == bind_port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the WebSocket server port"
                ));
            }
        }
        Ok(())
    }
}

/// Checks that `addr` looks like `host:port` with a non-zero port, and returns the port.
fn validate_host_port(addr: &str) -> Result<u16> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected host:port"))?;
    if host.trim().is_empty() {
        return Err(anyhow!("host cannot be empty"));
    }
    let port: u16 = port.parse().context("port is not a number")?;
    if port == 0 {
        return Err(anyhow!("port cannot be 0"));
    }
    Ok(port)
}
