// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! remotellm-broker: the public-facing relay that admits connectors over
//! persistent sockets and routes end-user model requests to them (C7).

pub mod config;
pub mod error;
pub mod router;
pub mod state;
pub mod store;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::state::BrokerState;
use crate::store::ConnectorStore;

/// Run the broker until shutdown is requested (`Ctrl+C` or `SIGTERM`).
pub async fn run(config: BrokerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind_host, config.http_port);
    let shutdown = CancellationToken::new();

    let store = config.connector_store_file.clone().map(|path| ConnectorStore::load(Some(path)));
    let connector_config = match &config.connector_config_file {
        Some(path) => load_connector_config(path)?,
        None => HashMap::new(),
    };

    if store.is_some() {
        tracing::info!("remotellm-broker listening on {addr} (approval workflow)");
    } else {
        tracing::info!("remotellm-broker listening on {addr} (legacy static-token)");
    }

    let state = Arc::new(BrokerState::new(config.clone(), store, connector_config, shutdown.clone()));
    let router = transport::build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;

    let serve = axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown_signal(shutdown.clone()));
    serve.await?;

    drain(&state, config.drain_timeout()).await;
    Ok(())
}

/// `{token: upstream_api_key}` map used in legacy static-token mode.
fn load_connector_config(path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    shutdown.cancel();
}

/// Wait for in-flight requests to finish, up to `timeout`.
async fn drain(state: &Arc<BrokerState>, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while state.inflight_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let remaining = state.inflight_count();
    if remaining > 0 {
        tracing::warn!(remaining, "drain timeout elapsed with requests still in flight");
    }
}
