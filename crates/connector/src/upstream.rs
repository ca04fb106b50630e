// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the local, OpenAI-compatible LLM server (C4's upstream
//! collaborator). Grounded on
//! `examples/original_source/src/remotellm/connector/llm_client.py`'s
//! `forward_request`/`forward_streaming_request`.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::Client;

use crate::error::ConnectorError;

const EXCLUDED_REQUEST_HEADERS: &[&str] = &["host", "connection", "authorization"];

/// Async HTTP client for the local LLM server.
pub struct UpstreamClient {
    base_url: String,
    host_header: Option<String>,
    client: Client,
}

impl UpstreamClient {
    pub fn new(base_url: &str, timeout: Duration, ssl_verify: bool, host_header: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).danger_accept_invalid_certs(!ssl_verify).build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_owned(), host_header, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_request(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<Vec<u8>>,
        upstream_api_key: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::POST);
        let mut req = self.client.request(method, self.url(path));

        for (name, value) in headers {
            if !EXCLUDED_REQUEST_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                req = req.header(name, value);
            }
        }
        if let Some(host) = &self.host_header {
            req = req.header("Host", host);
        }
        if let Some(key) = upstream_api_key {
            req = req.bearer_auth(key);
        }
        if let Some(body) = body {
            req = req.body(body);
        }
        req
    }

    /// Forward a non-streaming request. Returns `(status, headers, body)`.
    pub async fn forward(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<Vec<u8>>,
        upstream_api_key: Option<&str>,
    ) -> Result<(u16, HashMap<String, String>, Vec<u8>), ConnectorError> {
        let req = self.build_request(method, path, headers, body, upstream_api_key);
        let resp = req.send().await.map_err(classify_error)?;
        let status = resp.status().as_u16();
        let response_headers = header_map(&resp);
        let body = resp.bytes().await.map_err(classify_error)?.to_vec();
        Ok((status, response_headers, body))
    }

    /// Forward a request whose response should be streamed back chunk by
    /// chunk. The status/headers are available immediately; the body is a
    /// single-pass stream of opaque byte chunks — it cannot be re-iterated.
    pub async fn forward_stream(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<Vec<u8>>,
        upstream_api_key: Option<&str>,
    ) -> Result<StreamResponse, ConnectorError> {
        let req = self.build_request(method, path, headers, body, upstream_api_key);
        let resp = req.send().await.map_err(classify_error)?;
        let status = resp.status().as_u16();
        let response_headers = header_map(&resp);
        Ok(StreamResponse { status, headers: response_headers, body: Box::pin(resp.bytes_stream()) })
    }

    /// Discover models from the local LLM server, tried as an OpenAI-compatible
    /// `/v1/models` endpoint first, falling back to Ollama's `/api/tags`.
    /// Used when the connector isn't configured with `models_override`.
    pub async fn discover_models(&self) -> Vec<String> {
        if let Ok(models) = self.discover_openai_models().await {
            return models;
        }
        self.discover_ollama_models().await.unwrap_or_default()
    }

    async fn discover_openai_models(&self) -> anyhow::Result<Vec<String>> {
        let resp = self.client.get(self.url("/v1/models")).send().await?.error_for_status()?;
        let value: serde_json::Value = resp.json().await?;
        let models = value
            .get("data")
            .and_then(|d| d.as_array())
            .into_iter()
            .flatten()
            .filter_map(|m| m.get("id").and_then(|v| v.as_str()).map(str::to_owned))
            .collect();
        Ok(models)
    }

    async fn discover_ollama_models(&self) -> anyhow::Result<Vec<String>> {
        let resp = self.client.get(self.url("/api/tags")).send().await?.error_for_status()?;
        let value: serde_json::Value = resp.json().await?;
        let models = value
            .get("models")
            .and_then(|d| d.as_array())
            .into_iter()
            .flatten()
            .filter_map(|m| m.get("name").or_else(|| m.get("model")).and_then(|v| v.as_str()).map(str::to_owned))
            .collect();
        Ok(models)
    }
}

/// The first element of a streaming forward (status + headers), plus a
/// single-pass stream of body chunks.
pub struct StreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    body: std::pin::Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
}

impl StreamResponse {
    /// Pull the next body chunk. Returns `None` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<bytes::Bytes, ConnectorError>> {
        self.body.next().await.map(|r| r.map_err(classify_error))
    }
}

fn header_map(resp: &reqwest::Response) -> HashMap<String, String> {
    resp.headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned())))
        .collect()
}

fn classify_error(err: reqwest::Error) -> ConnectorError {
    if err.is_timeout() {
        ConnectorError::Timeout
    } else if err.is_connect() {
        ConnectorError::UpstreamUnavailable
    } else {
        ConnectorError::Internal
    }
}
