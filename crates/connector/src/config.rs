// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the remotellm connector.
#[derive(Debug, Clone, clap::Args)]
pub struct ConnectorConfig {
    /// WebSocket URL of the broker to connect to (e.g. `wss://broker.example.com/ws`).
    #[arg(long, env = "REMOTELLM_CONNECTOR_BROKER_URL")]
    pub broker_url: String,

    /// Static broker auth token. Omit to start unapproved (PENDING) or to
    /// load a previously-approved key from `credentials_file`.
    #[arg(long, env = "REMOTELLM_CONNECTOR_BROKER_TOKEN")]
    pub broker_token: Option<String>,

    /// Path to persist the broker-issued API key across restarts.
    #[arg(long, env = "REMOTELLM_CONNECTOR_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Display name advertised in the `AUTH` frame.
    #[arg(long, env = "REMOTELLM_CONNECTOR_NAME")]
    pub display_name: Option<String>,

    /// Models this connector serves. Overrides model discovery when non-empty.
    #[arg(long, value_delimiter = ',', env = "REMOTELLM_CONNECTOR_MODELS")]
    pub models_override: Vec<String>,

    /// Base URL of the local OpenAI-compatible LLM server.
    #[arg(long, default_value = "http://localhost:11434", env = "REMOTELLM_CONNECTOR_UPSTREAM_URL")]
    pub upstream_url: String,

    /// API key to use against the upstream LLM server, unless the broker injects one.
    #[arg(long, env = "REMOTELLM_CONNECTOR_UPSTREAM_API_KEY")]
    pub upstream_api_key: Option<String>,

    /// Custom Host header for the upstream request (reverse-proxy setups).
    #[arg(long, env = "REMOTELLM_CONNECTOR_UPSTREAM_HOST_HEADER")]
    pub upstream_host_header: Option<String>,

    /// Verify TLS certificates when calling the upstream LLM server.
    #[arg(long, default_value_t = true, env = "REMOTELLM_CONNECTOR_UPSTREAM_SSL_VERIFY")]
    pub upstream_ssl_verify: bool,

    /// Base delay for exponential reconnect backoff, in milliseconds.
    #[arg(long, default_value_t = 1_000, env = "REMOTELLM_CONNECTOR_RECONNECT_BASE_DELAY_MS")]
    pub reconnect_base_delay_ms: u64,

    /// Maximum reconnect backoff delay, in milliseconds.
    #[arg(long, default_value_t = 300_000, env = "REMOTELLM_CONNECTOR_RECONNECT_MAX_DELAY_MS")]
    pub reconnect_max_delay_ms: u64,

    /// Interval between keepalive `PING` frames, in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "REMOTELLM_CONNECTOR_KEEPALIVE_INTERVAL_MS")]
    pub keepalive_interval_ms: u64,

    /// Timeout for a single upstream LLM request, in milliseconds.
    #[arg(long, default_value_t = 300_000, env = "REMOTELLM_CONNECTOR_UPSTREAM_TIMEOUT_MS")]
    pub upstream_timeout_ms: u64,

    /// Timeout for establishing the broker connection, in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "REMOTELLM_CONNECTOR_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: u64,

    /// Deadline for the broker's `AUTH_OK`/`AUTH_FAIL`/`PENDING` reply, in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "REMOTELLM_CONNECTOR_AUTH_TIMEOUT_MS")]
    pub auth_timeout_ms: u64,

    /// Drain deadline for in-flight requests on graceful shutdown, in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "REMOTELLM_CONNECTOR_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: u64,

    /// Version string advertised in the `AUTH` frame's `connector_version` field.
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"), env = "REMOTELLM_CONNECTOR_VERSION")]
    pub connector_version: String,

    /// Log level / filter directive (e.g. `info`, `remotellm_connector=debug`).
    #[arg(long, default_value = "info", env = "REMOTELLM_CONNECTOR_LOG_LEVEL")]
    pub log_level: String,
}

impl ConnectorConfig {
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
