// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::BrokerError;
use crate::state::BrokerState;

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate a Bearer token against a set of valid user API keys. An empty
/// set disables authentication.
pub fn validate_bearer(headers: &HeaderMap, valid_keys: &[String]) -> Result<(), BrokerError> {
    if valid_keys.is_empty() {
        return Ok(());
    }

    let header = headers.get("authorization").and_then(|v| v.to_str().ok()).ok_or(BrokerError::InvalidApiKey)?;
    let token = header.strip_prefix("Bearer ").ok_or(BrokerError::InvalidApiKey)?;

    if valid_keys.iter().any(|k| constant_time_eq(k, token)) {
        Ok(())
    } else {
        Err(BrokerError::InvalidApiKey)
    }
}

/// Axum middleware enforcing end-user bearer auth on the HTTP edge.
///
/// Exempt: the connector WebSocket upgrade path, which authenticates via the
/// wire-level `AUTH` frame instead.
pub async fn auth_layer(state: State<Arc<BrokerState>>, req: Request<axum::body::Body>, next: Next) -> Response {
    if req.uri().path().starts_with("/ws") {
        return next.run(req).await;
    }

    if let Err(code) = validate_bearer(req.headers(), &state.config.user_api_keys) {
        let (status, body) = code.to_http_response("invalid or missing API key");
        return (status, body).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
