// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connector-side transport client (C4): connect, authenticate, persist
//! credentials, dispatch relayed requests to the upstream LLM, keepalive,
//! reconnect with backoff.
//!
//! Grounded on `examples/groblegark-coop/crates/mux/src/upstream/bridge.rs`'s
//! `run_loop` for the connect/backoff/reconnect loop shape; exact state
//! machine and credential lifecycle semantics cross-checked against
//! `examples/original_source/tests/unit/test_relay_client.py` (the
//! `relay_client` module itself is absent from the retrieved original
//! source, so its test suite is the source of truth for exact behavior).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use remotellm_protocol::{
    ApprovedPayload, AuthPayload, EmptyPayload, Envelope, ErrorPayload, Payload, RequestPayload, ResponsePayload,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ConnectorConfig;
use crate::credentials;
use crate::upstream::UpstreamClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

/// The client's connection state, mirroring SPEC_FULL §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Pending,
    Connected,
    Reconnecting,
}

/// How the broker replied to our `AUTH` frame.
enum AuthDecision {
    Accepted(String),
    Pending(String),
    Rejected,
}

fn classify_auth_reply(payload: &Payload) -> AuthDecision {
    match payload {
        Payload::AuthOk(p) => AuthDecision::Accepted(p.session_id.clone()),
        Payload::Pending(p) => AuthDecision::Pending(p.connector_id.clone()),
        // AUTH_FAIL and any other unexpected reply are both treated as a
        // rejection: close and reconnect.
        _ => AuthDecision::Rejected,
    }
}

/// Exponential backoff with up to 25% jitter, capped at `max`. `attempt` is
/// 1-based (first failure = 1). `jitter01` must be in `[0, 1)`.
pub fn next_reconnect_delay(attempt: u32, base: Duration, max: Duration, jitter01: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let raw = base.as_secs_f64() * 2f64.powi(exponent as i32);
    let capped = raw.min(max.as_secs_f64());
    let jitter = capped * 0.25 * jitter01.clamp(0.0, 1.0);
    Duration::from_secs_f64(capped + jitter)
}

fn is_streaming_request(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("stream").and_then(|s| s.as_bool()))
        .unwrap_or(false)
}

/// The connector's transport client (C4).
pub struct RelayClient {
    config: ConnectorConfig,
    upstream: Arc<UpstreamClient>,
    models: Mutex<Vec<String>>,
    broker_token: Mutex<Option<String>>,
    state: Mutex<ConnectionState>,
    connector_id: Mutex<Option<String>>,
    session_id: Mutex<Option<String>>,
    reconnect_attempt: AtomicU32,
    running: AtomicBool,
    sink: Mutex<Option<WsSink>>,
}

impl RelayClient {
    pub fn new(config: ConnectorConfig, upstream: Arc<UpstreamClient>, models: Vec<String>) -> Self {
        let broker_token = config.broker_token.clone().or_else(|| {
            config.credentials_file.as_deref().and_then(credentials::load)
        });
        Self {
            config,
            upstream,
            models: Mutex::new(models),
            broker_token: Mutex::new(broker_token),
            state: Mutex::new(ConnectionState::Disconnected),
            connector_id: Mutex::new(None),
            session_id: Mutex::new(None),
            reconnect_attempt: AtomicU32::new(0),
            running: AtomicBool::new(false),
            sink: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session_id.lock().await.clone()
    }

    pub async fn connector_id(&self) -> Option<String> {
        self.connector_id.lock().await.clone()
    }

    pub async fn broker_token(&self) -> Option<String> {
        self.broker_token.lock().await.clone()
    }

    /// Run until `stop()` is called. Reconnects indefinitely on failure.
    pub async fn run(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            match self.connect_and_authenticate().await {
                Some(mut stream) => {
                    self.reconnect_attempt.store(0, Ordering::SeqCst);
                    let keepalive = tokio::spawn(Arc::clone(self).keepalive_loop());
                    self.message_loop(&mut stream).await;
                    keepalive.abort();
                    *self.state.lock().await = ConnectionState::Disconnected;
                    *self.sink.lock().await = None;
                }
                None => {}
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.handle_reconnect().await;
        }
    }

    /// Connect, send `AUTH`, and await the broker's reply. Returns the
    /// inbound half of the socket on success (CONNECTED or PENDING); `None`
    /// on any failure, leaving the state DISCONNECTED for the caller to
    /// back off and retry.
    async fn connect_and_authenticate(&self) -> Option<futures_util::stream::SplitStream<WsStream>> {
        *self.state.lock().await = ConnectionState::Connecting;

        let connect = tokio_tungstenite::connect_async(&self.config.broker_url);
        let ws_stream = match tokio::time::timeout(self.config.connect_timeout(), connect).await {
            Ok(Ok((stream, _response))) => stream,
            _ => {
                *self.state.lock().await = ConnectionState::Disconnected;
                return None;
            }
        };

        *self.state.lock().await = ConnectionState::Authenticating;
        let (mut sink, mut stream) = ws_stream.split();

        let models = self.models.lock().await.clone();
        let token = self.broker_token.lock().await.clone();
        let auth = Envelope::new(
            format!("auth-{}", short_hex()),
            Payload::Auth(AuthPayload {
                token,
                name: self.config.display_name.clone(),
                models,
                connector_version: self.config.connector_version.clone(),
            }),
        );
        let Ok(frame) = auth.to_frame() else {
            *self.state.lock().await = ConnectionState::Disconnected;
            return None;
        };
        if sink.send(Message::Text(frame.into())).await.is_err() {
            *self.state.lock().await = ConnectionState::Disconnected;
            return None;
        }

        let reply = tokio::time::timeout(self.config.auth_timeout(), stream.next()).await;
        let envelope = match reply {
            Ok(Some(Ok(Message::Text(text)))) => Envelope::from_frame(text.as_str()).ok(),
            _ => None,
        };

        let Some(envelope) = envelope else {
            *self.state.lock().await = ConnectionState::Disconnected;
            let _ = sink.close().await;
            return None;
        };

        match classify_auth_reply(&envelope.payload) {
            AuthDecision::Accepted(session_id) => {
                *self.session_id.lock().await = Some(session_id);
                *self.state.lock().await = ConnectionState::Connected;
                *self.sink.lock().await = Some(sink);
                Some(stream)
            }
            AuthDecision::Pending(connector_id) => {
                *self.connector_id.lock().await = Some(connector_id);
                *self.state.lock().await = ConnectionState::Pending;
                *self.sink.lock().await = Some(sink);
                Some(stream)
            }
            AuthDecision::Rejected => {
                *self.state.lock().await = ConnectionState::Disconnected;
                let _ = sink.close().await;
                None
            }
        }
    }

    /// Read frames until the socket closes, dispatching each. Returns once
    /// the connection ends for any reason.
    async fn message_loop(self: &Arc<Self>, stream: &mut futures_util::stream::SplitStream<WsStream>) {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match Envelope::from_frame(text.as_str()) {
                    Ok(envelope) => {
                        if self.handle_message(envelope).await.is_break() {
                            return;
                        }
                    }
                    Err(_) => tracing::debug!("dropped malformed frame from broker"),
                },
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {} // binary/ping/pong ignored at the WS-protocol level
                Some(Err(_)) => return,
            }
        }
    }

    /// Handle one inbound envelope. Returns `ControlFlow::Break` when the
    /// connection should be torn down (APPROVED/REVOKED force a reconnect).
    async fn handle_message(self: &Arc<Self>, envelope: Envelope) -> std::ops::ControlFlow<()> {
        match envelope.payload {
            Payload::Request(payload) => {
                tokio::spawn(Arc::clone(self).handle_request(envelope.id, payload));
                std::ops::ControlFlow::Continue(())
            }
            Payload::Ping(_) => {
                let pong = Envelope::new(envelope.id, Payload::Pong(EmptyPayload {}));
                let _ = self.send_envelope(&pong).await;
                std::ops::ControlFlow::Continue(())
            }
            Payload::Pong(_) => {
                tracing::debug!(correlation_id = %envelope.id, "received keepalive pong");
                std::ops::ControlFlow::Continue(())
            }
            Payload::Approved(ApprovedPayload { api_key }) => {
                self.on_approved(&api_key).await;
                std::ops::ControlFlow::Break(())
            }
            Payload::Revoked(_) => {
                self.on_revoked().await;
                std::ops::ControlFlow::Break(())
            }
            Payload::Cancel(_) => {
                tracing::info!(correlation_id = %envelope.id, "received cancel (no-op)");
                std::ops::ControlFlow::Continue(())
            }
            other => {
                tracing::debug!(frame_type = other.type_name(), "unexpected frame from broker");
                std::ops::ControlFlow::Continue(())
            }
        }
    }

    async fn on_approved(&self, api_key: &str) {
        if let Some(path) = &self.config.credentials_file {
            if let Err(e) = credentials::save(path, api_key) {
                tracing::warn!(err = %e, "failed to persist broker credentials");
            }
        }
        *self.broker_token.lock().await = Some(api_key.to_owned());
        self.reconnect_attempt.store(0, Ordering::SeqCst);
        *self.state.lock().await = ConnectionState::Disconnected;
    }

    async fn on_revoked(&self) {
        if let Some(path) = &self.config.credentials_file {
            credentials::clear(path);
        }
        *self.broker_token.lock().await = None;
        *self.state.lock().await = ConnectionState::Disconnected;
    }

    async fn send_envelope(&self, envelope: &Envelope) -> Result<(), ()> {
        let frame = envelope.to_frame().map_err(|_| ())?;
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else { return Err(()) };
        sink.send(Message::Text(frame.into())).await.map_err(|_| ())
    }

    async fn keepalive_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.keepalive_interval());
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            let state = *self.state.lock().await;
            if !matches!(state, ConnectionState::Connected | ConnectionState::Pending) {
                break;
            }
            let ping = Envelope::new(format!("ping-{}", short_hex()), Payload::Ping(EmptyPayload {}));
            if self.send_envelope(&ping).await.is_err() {
                break;
            }
        }
    }

    async fn handle_reconnect(&self) {
        *self.state.lock().await = ConnectionState::Reconnecting;
        let attempt = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = next_reconnect_delay(
            attempt,
            self.config.reconnect_base_delay(),
            self.config.reconnect_max_delay(),
            rand::rng().random::<f64>(),
        );
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting to broker");
        tokio::time::sleep(delay).await;
        *self.state.lock().await = ConnectionState::Disconnected;
    }

    /// Forward one relayed `REQUEST` to the upstream LLM and reply with
    /// `RESPONSE`/`STREAM_CHUNK`*+`STREAM_END`/`ERROR`.
    async fn handle_request(self: Arc<Self>, correlation_id: String, payload: RequestPayload) {
        let body = payload.decode_body().unwrap_or_default();
        let upstream_key = payload.upstream_api_key.clone().or_else(|| self.config.upstream_api_key.clone());

        if is_streaming_request(&body) {
            self.forward_streaming(correlation_id, payload, body, upstream_key).await;
        } else {
            self.forward_unary(correlation_id, payload, body, upstream_key).await;
        }
    }

    async fn forward_unary(&self, correlation_id: String, payload: RequestPayload, body: Vec<u8>, upstream_key: Option<String>) {
        let result = self
            .upstream
            .forward(&payload.method, &payload.path, &payload.headers, Some(body), upstream_key.as_deref())
            .await;

        let envelope = match result {
            Ok((status, headers, body)) => Envelope::new(
                correlation_id,
                Payload::Response(ResponsePayload::with_body(status, strip_transfer_encoding(headers), &body)),
            ),
            Err(e) => Envelope::new(correlation_id, Payload::Error(e.to_wire_payload(e.to_string()))),
        };
        let _ = self.send_envelope(&envelope).await;
    }

    async fn forward_streaming(
        &self,
        correlation_id: String,
        payload: RequestPayload,
        body: Vec<u8>,
        upstream_key: Option<String>,
    ) {
        let mut response = match self
            .upstream
            .forward_stream(&payload.method, &payload.path, &payload.headers, Some(body), upstream_key.as_deref())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let envelope = Envelope::new(correlation_id, Payload::Error(e.to_wire_payload(e.to_string())));
                let _ = self.send_envelope(&envelope).await;
                return;
            }
        };

        if response.status >= 400 {
            // The status line is already known to be an error; drain this
            // same single-pass stream (not a second request) to collect the
            // body text rather than re-invoking the upstream call.
            let mut error_body = Vec::new();
            while let Some(chunk) = response.next_chunk().await {
                if let Ok(bytes) = chunk {
                    error_body.extend_from_slice(&bytes);
                }
            }
            let text = String::from_utf8_lossy(&error_body).into_owned();
            let envelope = Envelope::new(
                correlation_id,
                Payload::Error(ErrorPayload { status: response.status, error: text, code: "llm_error".to_owned() }),
            );
            let _ = self.send_envelope(&envelope).await;
            return;
        }

        loop {
            match response.next_chunk().await {
                Some(Ok(bytes)) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    let chunk = remotellm_protocol::StreamChunkPayload {
                        chunk: String::from_utf8_lossy(&bytes).into_owned(),
                        done: false,
                    };
                    let envelope = Envelope::new(correlation_id.clone(), Payload::StreamChunk(chunk));
                    if self.send_envelope(&envelope).await.is_err() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    let envelope = Envelope::new(correlation_id, Payload::Error(e.to_wire_payload(e.to_string())));
                    let _ = self.send_envelope(&envelope).await;
                    return;
                }
                None => {
                    let envelope =
                        Envelope::new(correlation_id, Payload::StreamEnd(remotellm_protocol::StreamEndPayload {}));
                    let _ = self.send_envelope(&envelope).await;
                    return;
                }
            }
        }
    }

    /// Stop the client. The current socket (if any) is closed and `run()`
    /// returns once its loop observes `running == false`.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
        *self.state.lock().await = ConnectionState::Disconnected;
    }
}

fn strip_transfer_encoding(headers: HashMap<String, String>) -> HashMap<String, String> {
    headers.into_iter().filter(|(k, _)| k.to_ascii_lowercase() != "transfer-encoding").collect()
}

fn short_hex() -> String {
    let bytes: [u8; 4] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
