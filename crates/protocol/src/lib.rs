// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the connector \<-\> broker transport channel.
//!
//! One JSON text frame carries one [`Envelope`]: a correlation `id` plus a
//! `type`-tagged [`Payload`]. The codec has no I/O of its own — both the
//! broker and the connector depend on it, never the other way around.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A single frame on the wire: `{"id": ..., "type": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn new(id: impl Into<String>, payload: Payload) -> Self {
        Self { id: id.into(), payload }
    }

    /// The `type` tag of this envelope's payload, e.g. `"AUTH_OK"`.
    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }

    /// Serialize to the exact text that goes over the wire as one frame.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse one received text frame. Per the forward-compatibility contract,
    /// callers should log-and-drop on `Err` rather than tear down the channel
    /// (the sole exception being the first frame during authentication).
    pub fn from_frame(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Type-specific payload, discriminated by the wire `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Payload {
    #[serde(rename = "AUTH")]
    Auth(AuthPayload),
    #[serde(rename = "AUTH_OK")]
    AuthOk(AuthOkPayload),
    #[serde(rename = "AUTH_FAIL")]
    AuthFail(AuthFailPayload),
    #[serde(rename = "PENDING")]
    Pending(PendingPayload),
    #[serde(rename = "APPROVED")]
    Approved(ApprovedPayload),
    #[serde(rename = "REVOKED")]
    Revoked(RevokedPayload),
    #[serde(rename = "REQUEST")]
    Request(RequestPayload),
    #[serde(rename = "RESPONSE")]
    Response(ResponsePayload),
    #[serde(rename = "STREAM_CHUNK")]
    StreamChunk(StreamChunkPayload),
    #[serde(rename = "STREAM_END")]
    StreamEnd(StreamEndPayload),
    #[serde(rename = "ERROR")]
    Error(ErrorPayload),
    #[serde(rename = "PING")]
    Ping(EmptyPayload),
    #[serde(rename = "PONG")]
    Pong(EmptyPayload),
    #[serde(rename = "CANCEL")]
    Cancel(EmptyPayload),
}

impl Payload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH",
            Self::AuthOk(_) => "AUTH_OK",
            Self::AuthFail(_) => "AUTH_FAIL",
            Self::Pending(_) => "PENDING",
            Self::Approved(_) => "APPROVED",
            Self::Revoked(_) => "REVOKED",
            Self::Request(_) => "REQUEST",
            Self::Response(_) => "RESPONSE",
            Self::StreamChunk(_) => "STREAM_CHUNK",
            Self::StreamEnd(_) => "STREAM_END",
            Self::Error(_) => "ERROR",
            Self::Ping(_) => "PING",
            Self::Pong(_) => "PONG",
            Self::Cancel(_) => "CANCEL",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub connector_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthOkPayload {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthFailPayload {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayload {
    pub connector_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedPayload {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_api_key: Option<String>,
}

impl RequestPayload {
    /// Decode the base64 `body` field to raw bytes.
    pub fn decode_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.body)
    }

    /// Build a payload from raw bytes, base64-encoding the body.
    pub fn with_body(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        body: &[u8],
        upstream_api_key: Option<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers,
            body: BASE64.encode(body),
            upstream_api_key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub status: u16,
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl ResponsePayload {
    pub fn decode_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.body)
    }

    pub fn with_body(status: u16, headers: HashMap<String, String>, body: &[u8]) -> Self {
        Self { status, headers, body: BASE64.encode(body) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunkPayload {
    pub chunk: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamEndPayload {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub status: u16,
    pub error: String,
    pub code: String,
}

/// Connector API key format: `ck-` + 32 lowercase hex characters.
pub fn is_connector_api_key(s: &str) -> bool {
    matches_prefixed_hex(s, "ck-", 32)
}

/// User API key format: `sk-` + 32 lowercase hex characters.
pub fn is_user_api_key(s: &str) -> bool {
    matches_prefixed_hex(s, "sk-", 32)
}

/// Connector id format: `conn-` + 8 lowercase hex characters.
pub fn is_connector_id(s: &str) -> bool {
    matches_prefixed_hex(s, "conn-", 8)
}

fn matches_prefixed_hex(s: &str, prefix: &str, hex_len: usize) -> bool {
    match s.strip_prefix(prefix) {
        Some(rest) => rest.len() == hex_len && rest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()),
        None => false,
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
