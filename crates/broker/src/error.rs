// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use remotellm_protocol::ErrorPayload;
use serde::{Deserialize, Serialize};

/// Error kinds observed at the broker's HTTP and transport boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerError {
    InvalidApiKey,
    MissingModel,
    ModelNotFound,
    /// The route's connector isn't currently registered (pre-dispatch).
    ConnectorUnavailable,
    /// The connector disconnected while a request was in flight.
    ConnectorDisconnected,
    Timeout,
    LlmError(u16),
    Internal,
}

impl BrokerError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidApiKey => 401,
            Self::MissingModel => 400,
            Self::ModelNotFound => 404,
            Self::ConnectorUnavailable => 503,
            Self::ConnectorDisconnected => 502,
            Self::Timeout => 504,
            Self::LlmError(status) => *status,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidApiKey => "invalid_api_key",
            Self::MissingModel => "missing_model",
            Self::ModelNotFound => "model_not_found",
            Self::ConnectorUnavailable | Self::ConnectorDisconnected => "connector_unavailable",
            Self::Timeout => "timeout",
            Self::LlmError(_) => "llm_error",
            Self::Internal => "internal_error",
        }
    }

    /// The OpenAI-style `error.type` discriminant, which (unlike `code`)
    /// varies per HTTP status rather than reusing one value for every kind.
    pub fn as_type(&self) -> &'static str {
        match self {
            Self::InvalidApiKey => "authentication_error",
            Self::MissingModel | Self::ModelNotFound => "invalid_request_error",
            Self::ConnectorUnavailable => "service_unavailable",
            Self::ConnectorDisconnected => "bad_gateway",
            Self::Timeout => "timeout",
            Self::LlmError(_) => self.as_str(),
            Self::Internal => "internal_error",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { message: message.into(), r#type: self.as_type().to_owned(), code: self.as_str().to_owned() }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }

    /// Build the wire `ERROR` payload equivalent of this error.
    pub fn to_wire_payload(&self, message: impl Into<String>) -> ErrorPayload {
        ErrorPayload { status: self.http_status(), error: message.into(), code: self.as_str().to_owned() }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for BrokerError {}

/// Top-level error response envelope, `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub r#type: String,
    pub code: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
