// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the broker's HTTP edge.
//!
//! Uses `axum_test::TestServer` against `build_router` directly, no real TCP
//! needed, matching the flows in the coverage paths that don't require a
//! live connector socket.

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use tokio_util::sync::CancellationToken;

use remotellm_broker::config::BrokerConfig;
use remotellm_broker::state::BrokerState;
use remotellm_broker::transport::build_router;

fn test_config(user_api_keys: Vec<String>) -> BrokerConfig {
    BrokerConfig {
        bind_host: "127.0.0.1".into(),
        http_port: 0,
        connector_tokens: Vec::new(),
        user_api_keys,
        connector_config_file: None,
        connector_store_file: None,
        auth_timeout_ms: 10_000,
        request_timeout_ms: 30_000,
        ping_interval_ms: 30_000,
        drain_timeout_ms: 30_000,
        log_level: "info".into(),
    }
}

fn test_server(config: BrokerConfig) -> TestServer {
    server_with_state(config).1
}

fn server_with_state(config: BrokerConfig) -> (Arc<BrokerState>, TestServer) {
    let state = Arc::new(BrokerState::new(config, None, Default::default(), CancellationToken::new()));
    let router = build_router(Arc::clone(&state));
    (state, TestServer::new(router).expect("failed to create test server"))
}

#[tokio::test]
async fn models_with_no_connectors_is_an_empty_list() {
    let server = test_server(test_config(Vec::new()));
    let resp = server.get("/v1/models").await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn missing_bearer_is_rejected_when_user_keys_are_configured() {
    let server = test_server(test_config(vec!["sk-0123456789abcdef0123456789abcdef".into()]));
    let resp = server.get("/v1/models").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_bearer_is_rejected() {
    let server = test_server(test_config(vec!["sk-0123456789abcdef0123456789abcdef".into()]));
    let resp = server
        .get("/v1/models")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer sk-wrongwrongwrongwrongwrongwrong00"))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn correct_bearer_is_accepted() {
    let server = test_server(test_config(vec!["sk-0123456789abcdef0123456789abcdef".into()]));
    let resp = server
        .get("/v1/models")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer sk-0123456789abcdef0123456789abcdef"))
        .await;
    resp.assert_status_ok();
}

#[tokio::test]
async fn unknown_model_returns_404() {
    let server = test_server(test_config(Vec::new()));
    let resp = server.post("/v1/chat/completions").json(&serde_json::json!({"model": "m2", "messages": []})).await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "model_not_found");
    assert_eq!(body["error"]["message"], "Model 'm2' not found");
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn body_without_a_model_field_returns_400_missing_model() {
    let server = test_server(test_config(Vec::new()));
    let resp = server.post("/v1/chat/completions").json(&serde_json::json!([1, 2, 3])).await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "missing_model");
}

#[tokio::test]
async fn missing_model_field_returns_400() {
    let server = test_server(test_config(Vec::new()));
    let resp = server.post("/v1/chat/completions").json(&serde_json::json!({"messages": []})).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

/// A model routed to a connector_id with no live registration (e.g. the
/// connector disconnected after registering the route but before this
/// request arrived) is the pre-dispatch "not ACCEPTED" case, which stays
/// 503 per spec §4.6 step 3 — distinct from the 502 a *mid-request*
/// disconnect produces (S6).
#[tokio::test]
async fn routed_but_disconnected_connector_returns_503_service_unavailable() {
    let (state, server) = server_with_state(test_config(Vec::new()));
    state.router.on_registered("conn-deadbeef", vec!["m1".into()], None);

    let resp = server.post("/v1/chat/completions").json(&serde_json::json!({"model": "m1", "messages": []})).await;
    resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "connector_unavailable");
    assert_eq!(body["error"]["type"], "service_unavailable");
}
