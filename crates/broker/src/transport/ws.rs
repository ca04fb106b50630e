// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector-facing WebSocket endpoint (C5): admission, the ACCEPTED message
//! loop, and the PENDING holding loop.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use remotellm_protocol::{
    ApprovedPayload, AuthFailPayload, AuthOkPayload, AuthPayload, Envelope, EmptyPayload, PendingPayload, Payload,
    RevokedPayload,
};
use tokio::sync::Mutex;

use crate::store::ConnectorStatus;
use crate::state::{BrokerState, PendingAdmission, PendingExchanges, Registration};
use crate::transport::registration::{dispatch_inbound, drain_on_disconnect, send_envelope};

pub async fn ws_handler(State(state): State<Arc<BrokerState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

enum Admission {
    Accepted { connector_id: String, upstream_api_key: Option<String> },
    Pending { connector_id: String },
    Rejected { reason: String },
}

fn decide_admission(state: &BrokerState, auth: &AuthPayload) -> Admission {
    if let Some(store) = &state.store {
        let lookup = auth.token.as_deref().and_then(|t| store.lookup_by_token(t));
        match lookup {
            Some(record) if record.status == ConnectorStatus::Approved => {
                Admission::Accepted { connector_id: record.connector_id, upstream_api_key: None }
            }
            Some(record) if record.status == ConnectorStatus::Revoked => {
                Admission::Rejected { reason: "connector has been revoked".to_owned() }
            }
            _ => {
                let record = store.create_pending(auth.models.clone(), auth.name.clone());
                Admission::Pending { connector_id: record.connector_id }
            }
        }
    } else if state.config.connector_tokens.is_empty() {
        Admission::Accepted { connector_id: crate::store::generate_connector_id(), upstream_api_key: None }
    } else {
        match auth.token.as_deref() {
            Some(token) if state.config.connector_tokens.iter().any(|t| t == token) => {
                let upstream_key = state.connector_config.get(token).cloned();
                Admission::Accepted { connector_id: crate::store::generate_connector_id(), upstream_api_key: upstream_key }
            }
            _ => Admission::Rejected { reason: "invalid connector token".to_owned() },
        }
    }
}

async fn handle_connection(state: Arc<BrokerState>, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let sink = Mutex::new(sink);

    let first_text = match tokio::time::timeout(state.config.auth_timeout(), stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text.to_string(),
        _ => {
            let _ = write_frame(&sink, &auth_fail_envelope("no AUTH frame received within deadline")).await;
            return;
        }
    };

    let envelope = match Envelope::from_frame(&first_text) {
        Ok(env) => env,
        Err(_) => {
            let _ = write_frame(&sink, &auth_fail_envelope("malformed first frame")).await;
            return;
        }
    };

    let auth = match envelope.payload {
        Payload::Auth(auth) => auth,
        _ => {
            let _ = write_frame(&sink, &auth_fail_envelope("first frame must be AUTH")).await;
            return;
        }
    };

    match decide_admission(&state, &auth) {
        Admission::Rejected { reason } => {
            let _ = write_frame(&sink, &auth_fail_envelope(&reason)).await;
        }
        Admission::Pending { connector_id } => {
            let ok = Envelope::new(
                envelope.id.clone(),
                Payload::Pending(PendingPayload { connector_id: connector_id.clone(), message: "awaiting admin approval".to_owned() }),
            );
            if write_frame(&sink, &ok).await.is_err() {
                return;
            }
            let admission = Arc::new(PendingAdmission { connector_id: connector_id.clone(), models: auth.models, display_name: auth.name, sink });
            state.pending_admissions.write().await.insert(connector_id.clone(), Arc::clone(&admission));
            pending_loop(&admission, &mut stream).await;
            state.pending_admissions.write().await.remove(&connector_id);
        }
        Admission::Accepted { connector_id, upstream_api_key } => {
            let ok = Envelope::new(envelope.id.clone(), Payload::AuthOk(AuthOkPayload { session_id: connector_id.clone() }));
            if write_frame(&sink, &ok).await.is_err() {
                return;
            }

            if let Some(store) = &state.store {
                store.update_models(&connector_id, auth.models.clone());
                store.update_last_connected(&connector_id);
            }
            state.router.on_registered(&connector_id, auth.models.clone(), upstream_api_key.clone());

            let registration = Arc::new(Registration {
                connector_id: connector_id.clone(),
                models: auth.models,
                upstream_api_key,
                connected_at: Instant::now(),
                sink,
                exchanges: PendingExchanges::default(),
            });
            state.registrations.write().await.insert(connector_id.clone(), Arc::clone(&registration));

            let ping_task = tokio::spawn(keepalive_loop(Arc::clone(&registration), state.config.ping_interval()));

            accepted_loop(&registration, &mut stream).await;

            ping_task.abort();
            state.registrations.write().await.remove(&connector_id);
            state.router.on_disconnected(&connector_id);
            drain_on_disconnect(&registration.exchanges).await;
        }
    }
}

async fn accepted_loop(registration: &Arc<Registration>, stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin)) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match Envelope::from_frame(&text) {
                Ok(env) => {
                    if matches!(env.payload, Payload::Ping(_)) {
                        let pong = Envelope::new(&env.id, Payload::Pong(EmptyPayload {}));
                        if send_envelope(registration, &pong).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    dispatch_inbound(&registration.exchanges, &registration.connector_id, env).await;
                }
                Err(_) => {
                    tracing::debug!(connector_id = %registration.connector_id, "dropped malformed frame");
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {} // binary/ping/pong frames ignored at the WS-protocol level
            Some(Err(_)) => break,
        }
    }
}

async fn pending_loop(admission: &Arc<PendingAdmission>, stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin)) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match Envelope::from_frame(&text) {
                Ok(env) if matches!(env.payload, Payload::Ping(_)) => {
                    let pong = Envelope::new(&env.id, Payload::Pong(EmptyPayload {}));
                    if let Ok(frame) = pong.to_frame() {
                        let mut sink = admission.sink.lock().await;
                        if sink.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                }
                _ => {} // any other frame is ignored while PENDING
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(_)) => break,
        }
    }
}

async fn keepalive_loop(registration: Arc<Registration>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately; skip it
    loop {
        ticker.tick().await;
        let ping = Envelope::new(format!("ping-{}", registration.connector_id), Payload::Ping(EmptyPayload {}));
        if send_envelope(&registration, &ping).await.is_err() {
            break;
        }
    }
}

async fn write_frame(sink: &Mutex<futures_util::stream::SplitSink<WebSocket, Message>>, envelope: &Envelope) -> Result<(), ()> {
    let frame = envelope.to_frame().map_err(|_| ())?;
    let mut sink = sink.lock().await;
    sink.send(Message::Text(frame.into())).await.map_err(|_| ())
}

fn auth_fail_envelope(reason: &str) -> Envelope {
    Envelope::new("auth", Payload::AuthFail(AuthFailPayload { error: reason.to_owned() }))
}

fn approved_envelope(api_key: &str) -> Envelope {
    Envelope::new("admin", Payload::Approved(ApprovedPayload { api_key: api_key.to_owned() }))
}

fn revoked_envelope(reason: Option<String>) -> Envelope {
    Envelope::new("admin", Payload::Revoked(RevokedPayload { reason }))
}

/// Push `APPROVED{api_key}` to a still-connected pending admission and close
/// its socket, per §4.5: the connector reconnects with the new key rather
/// than being upgraded in place. Returns `false` if it already disconnected.
pub async fn notify_approval(state: &BrokerState, connector_id: &str, api_key: &str) -> bool {
    let Some(admission) = state.pending_admissions.read().await.get(connector_id).cloned() else {
        return false;
    };
    let _ = write_frame(&admission.sink, &approved_envelope(api_key)).await;
    let mut sink = admission.sink.lock().await;
    let _ = sink.send(Message::Close(None)).await;
    true
}

/// Push `REVOKED` to a connector, whether it is currently ACCEPTED or still
/// PENDING, and close its socket.
pub async fn notify_revoke(state: &BrokerState, connector_id: &str, reason: Option<String>) -> bool {
    if let Some(registration) = state.registrations.read().await.get(connector_id).cloned() {
        let _ = send_envelope(&registration, &revoked_envelope(reason)).await;
        let mut sink = registration.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        return true;
    }
    if let Some(admission) = state.pending_admissions.read().await.get(connector_id).cloned() {
        let _ = write_frame(&admission.sink, &revoked_envelope(reason)).await;
        let mut sink = admission.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        return true;
    }
    false
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
