// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker's user-facing HTTP edge (C6): `/v1/chat/completions` and
//! `/v1/models`. End-user bearer auth is enforced upstream by
//! [`super::auth::auth_layer`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream;
use remotellm_protocol::{Envelope, Payload, RequestPayload};
use serde::Serialize;

use crate::error::BrokerError;
use crate::state::{BrokerState, ExchangeError};
use crate::transport::registration;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const PASSTHROUGH_RESPONSE_HEADERS: &[&str] = &["content-type"];
const EXCLUDED_REQUEST_HEADERS: &[&str] = &["host", "connection", "authorization"];

#[derive(Debug, Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
    created: u64,
    owned_by: &'static str,
}

#[derive(Debug, Serialize)]
struct ModelList {
    object: &'static str,
    data: Vec<ModelEntry>,
}

/// `GET /v1/models`
pub async fn list_models(State(state): State<Arc<BrokerState>>) -> impl IntoResponse {
    let now = epoch_secs();
    let data = state
        .router
        .list_models()
        .into_iter()
        .map(|id| ModelEntry { id, object: "model", created: now, owned_by: "remotellm" })
        .collect();
    Json(ModelList { object: "list", data })
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(State(state): State<Arc<BrokerState>>, headers: HeaderMap, body: Bytes) -> Response {
    let _inflight = state.begin_inflight();

    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return error_response(BrokerError::MissingModel, "request body is not valid JSON"),
    };
    let Some(model) = value.get("model").and_then(|v| v.as_str()) else {
        return error_response(BrokerError::MissingModel, "request body is missing a \"model\" field");
    };
    let streaming = value.get("stream").and_then(|v| v.as_bool()).unwrap_or(false);

    let Some(route) = state.router.get_route(model) else {
        return error_response(BrokerError::ModelNotFound, format!("Model '{model}' not found"));
    };
    let Some(registration) = state.registrations.read().await.get(&route.connector_id).cloned() else {
        return error_response(BrokerError::ConnectorUnavailable, "the connector for this model is not connected");
    };

    if let Some(store) = &state.store {
        store.update_last_used(&route.connector_id);
    }

    let correlation_id = uuid::Uuid::new_v4().to_string();
    let payload = RequestPayload::with_body(
        "POST",
        CHAT_COMPLETIONS_PATH,
        passthrough_headers(&headers),
        &body,
        route.upstream_key.clone(),
    );
    let envelope = Envelope::new(correlation_id, Payload::Request(payload));

    if streaming {
        handle_streaming(&registration, envelope).await
    } else {
        handle_unary(&registration, envelope, state.config.request_timeout()).await
    }
}

async fn handle_unary(
    registration: &crate::state::Registration,
    envelope: Envelope,
    timeout: std::time::Duration,
) -> Response {
    match registration::send_request(registration, envelope, timeout).await {
        Ok(completed) => match completed.payload {
            Payload::Response(resp) => {
                let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK);
                let body = resp.decode_body().unwrap_or_default();
                let mut builder = Response::builder().status(status);
                for name in PASSTHROUGH_RESPONSE_HEADERS {
                    if let Some(value) = resp.headers.get(*name) {
                        builder = builder.header(*name, value.as_str());
                    }
                }
                builder.body(Body::from(body)).unwrap_or_else(|_| {
                    error_response(BrokerError::Internal, "failed to build upstream response")
                })
            }
            Payload::Error(err) => {
                let status = StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(crate::error::ErrorResponse { error: crate::error::ErrorBody { message: err.error, r#type: err.code.clone(), code: err.code } })).into_response()
            }
            _ => error_response(BrokerError::Internal, "connector sent an unexpected frame"),
        },
        Err(ExchangeError::Timeout) => error_response(BrokerError::Timeout, "timed out waiting for the connector"),
        Err(ExchangeError::Disconnected) => {
            error_response(BrokerError::ConnectorDisconnected, "the connector disconnected before replying")
        }
    }
}

async fn handle_streaming(registration: &crate::state::Registration, envelope: Envelope) -> Response {
    let rx = match registration::send_request_stream(registration, envelope).await {
        Ok(rx) => rx,
        Err(()) => return error_response(BrokerError::ConnectorDisconnected, "the connector disconnected before replying"),
    };

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(Some(envelope)) => {
                let chunk = chunk_bytes(envelope);
                Some((Ok::<Bytes, std::io::Error>(chunk), rx))
            }
            Some(None) | None => None,
        }
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .body(body)
        .unwrap_or_else(|_| error_response(BrokerError::Internal, "failed to build streaming response"))
}

fn chunk_bytes(envelope: Envelope) -> Bytes {
    match envelope.payload {
        Payload::StreamChunk(chunk) => Bytes::from(chunk.chunk.into_bytes()),
        Payload::Error(err) => {
            let line = format!(
                "data: {}\n\n",
                serde_json::json!({"error": {"message": err.error, "type": err.code, "code": err.code}})
            );
            Bytes::from(line.into_bytes())
        }
        _ => Bytes::new(),
    }
}

fn passthrough_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !EXCLUDED_REQUEST_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned())))
        .collect()
}

fn error_response(kind: BrokerError, message: impl Into<String>) -> Response {
    let (status, body) = kind.to_http_response(message);
    (status, body).into_response()
}

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
