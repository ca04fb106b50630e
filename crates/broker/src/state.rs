// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use remotellm_protocol::Envelope;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::router::ModelRouter;
use crate::store::ConnectorStore;

/// A terminal frame for a streaming exchange: `Some` for a chunk/error
/// envelope, `None` for the end-of-stream sentinel.
pub type StreamItem = Option<Envelope>;

/// Why a pending exchange failed to complete normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeError {
    Timeout,
    Disconnected,
}

pub type PendingOneResult = Result<Envelope, ExchangeError>;

/// The correlation-keyed exchange bookkeeping for one registration, kept
/// separate from socket I/O so routing logic is unit-testable without a
/// live connection.
#[derive(Default)]
pub struct PendingExchanges {
    pub pending_one: Mutex<HashMap<String, oneshot::Sender<PendingOneResult>>>,
    pub pending_stream: Mutex<HashMap<String, mpsc::UnboundedSender<StreamItem>>>,
}

/// A live, ACCEPTED connector registration.
pub struct Registration {
    pub connector_id: String,
    pub models: Vec<String>,
    pub upstream_api_key: Option<String>,
    pub connected_at: Instant,
    pub sink: Mutex<SplitSink<WebSocket, Message>>,
    pub exchanges: PendingExchanges,
}

/// A connected-but-not-yet-approved connector.
pub struct PendingAdmission {
    pub connector_id: String,
    pub models: Vec<String>,
    pub display_name: Option<String>,
    pub sink: Mutex<SplitSink<WebSocket, Message>>,
}

/// Shared broker state, threaded explicitly through every component.
pub struct BrokerState {
    pub config: BrokerConfig,
    /// `Some` in approval-workflow mode; `None` means legacy static-token mode.
    pub store: Option<ConnectorStore>,
    /// Static token -> upstream API key map, used only in legacy mode.
    pub connector_config: HashMap<String, String>,
    pub router: ModelRouter,
    pub registrations: RwLock<HashMap<String, Arc<Registration>>>,
    pub pending_admissions: RwLock<HashMap<String, Arc<PendingAdmission>>>,
    pub shutdown: CancellationToken,
    inflight: AtomicU64,
}

impl BrokerState {
    pub fn new(
        config: BrokerConfig,
        store: Option<ConnectorStore>,
        connector_config: HashMap<String, String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            connector_config,
            router: ModelRouter::new(),
            registrations: RwLock::new(HashMap::new()),
            pending_admissions: RwLock::new(HashMap::new()),
            shutdown,
            inflight: AtomicU64::new(0),
        }
    }

    pub fn begin_inflight(&self) -> InflightGuard<'_> {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        InflightGuard { counter: &self.inflight }
    }

    pub fn inflight_count(&self) -> u64 {
        self.inflight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter on drop, so it's accurate even if a
/// handler returns early via `?`.
pub struct InflightGuard<'a> {
    counter: &'a AtomicU64,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
