// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! remotellm-connector: colocated with a private LLM server, dials out to a
//! broker over a persistent socket and forwards relayed requests locally
//! (C4).

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod upstream;

use std::sync::Arc;

use tokio::sync::Notify;

use crate::client::RelayClient;
use crate::config::ConnectorConfig;
use crate::upstream::UpstreamClient;

/// Run the connector until shutdown is requested (`Ctrl+C` or `SIGTERM`).
pub async fn run(config: ConnectorConfig) -> anyhow::Result<()> {
    let upstream = Arc::new(UpstreamClient::new(
        &config.upstream_url,
        config.upstream_timeout(),
        config.upstream_ssl_verify,
        config.upstream_host_header.clone(),
    )?);

    let models = if config.models_override.is_empty() {
        let discovered = upstream.discover_models().await;
        if discovered.is_empty() {
            tracing::warn!("model discovery returned no models; advertising an empty model list");
        }
        discovered
    } else {
        config.models_override.clone()
    };

    let client = Arc::new(RelayClient::new(config, Arc::clone(&upstream), models));

    let shutdown = Arc::new(Notify::new());
    let signal_task = tokio::spawn(wait_for_shutdown_signal(Arc::clone(&shutdown)));

    let run_client = Arc::clone(&client);
    let run_task = tokio::spawn(async move { run_client.run().await });

    shutdown.notified().await;
    tracing::info!("shutdown signal received, closing broker connection");
    client.stop().await;

    let _ = run_task.await;
    signal_task.abort();
    Ok(())
}

async fn wait_for_shutdown_signal(shutdown: Arc<Notify>) {
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

    shutdown.notify_one();
}
