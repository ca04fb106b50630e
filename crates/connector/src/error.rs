// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use remotellm_protocol::ErrorPayload;
use serde::{Deserialize, Serialize};

/// Error kinds surfaced by the connector's upstream collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorError {
    Timeout,
    UpstreamUnavailable,
    Internal,
}

impl ConnectorError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Timeout => 504,
            Self::UpstreamUnavailable => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::UpstreamUnavailable => "llm_unavailable",
            Self::Internal => "internal_error",
        }
    }

    /// Build the wire `ERROR` payload equivalent of this error.
    pub fn to_wire_payload(&self, message: impl Into<String>) -> ErrorPayload {
        ErrorPayload { status: self.http_status(), error: message.into(), code: self.as_str().to_owned() }
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ConnectorError {}
