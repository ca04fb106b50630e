// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the remotellm broker.
#[derive(Debug, Clone, clap::Args)]
pub struct BrokerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "REMOTELLM_BROKER_BIND_HOST")]
    pub bind_host: String,

    /// Port for the public HTTP(S) listener.
    #[arg(long, default_value_t = 8443, env = "REMOTELLM_BROKER_HTTP_PORT")]
    pub http_port: u16,

    /// Legacy static connector tokens (comma-separated). Used only when
    /// `connector_store_file` is unset.
    #[arg(long, value_delimiter = ',', env = "REMOTELLM_BROKER_CONNECTOR_TOKENS")]
    pub connector_tokens: Vec<String>,

    /// Valid user API keys (comma-separated). Empty disables end-user auth.
    #[arg(long, value_delimiter = ',', env = "REMOTELLM_BROKER_USER_API_KEYS")]
    pub user_api_keys: Vec<String>,

    /// Path to a token -> upstream_api_key map (JSON), used in static-token mode.
    #[arg(long, env = "REMOTELLM_BROKER_CONNECTOR_CONFIG_FILE")]
    pub connector_config_file: Option<PathBuf>,

    /// Path to the persistent connector-store YAML file. When set, the broker
    /// runs in approval-workflow mode instead of legacy static-token mode.
    #[arg(long, env = "REMOTELLM_BROKER_CONNECTOR_STORE_FILE")]
    pub connector_store_file: Option<PathBuf>,

    /// Deadline for the first AUTH frame, in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "REMOTELLM_BROKER_AUTH_TIMEOUT_MS")]
    pub auth_timeout_ms: u64,

    /// Deadline for a user-facing request awaiting a connector reply, in milliseconds.
    #[arg(long, default_value_t = 300_000, env = "REMOTELLM_BROKER_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Per-socket keepalive ping interval, in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "REMOTELLM_BROKER_PING_INTERVAL_MS")]
    pub ping_interval_ms: u64,

    /// Graceful-shutdown drain deadline, in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "REMOTELLM_BROKER_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: u64,

    /// Log level / filter directive (e.g. `info`, `remotellm_broker=debug`).
    #[arg(long, default_value = "info", env = "REMOTELLM_BROKER_LOG_LEVEL")]
    pub log_level: String,
}

impl BrokerConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
