use super::*;
use crate::config::BrokerConfig;
use crate::store::ConnectorStore;
use tokio_util::sync::CancellationToken;

fn base_config() -> BrokerConfig {
    BrokerConfig {
        bind_host: "0.0.0.0".to_owned(),
        http_port: 8443,
        connector_tokens: Vec::new(),
        user_api_keys: Vec::new(),
        connector_config_file: None,
        connector_store_file: None,
        auth_timeout_ms: 10_000,
        request_timeout_ms: 300_000,
        ping_interval_ms: 30_000,
        drain_timeout_ms: 30_000,
        log_level: "info".to_owned(),
    }
}

fn auth(token: Option<&str>, models: &[&str]) -> AuthPayload {
    AuthPayload {
        token: token.map(str::to_owned),
        name: None,
        models: models.iter().map(|s| s.to_string()).collect(),
        connector_version: "test".to_owned(),
    }
}

#[test]
fn approval_workflow_mode_unknown_token_becomes_pending() {
    let mut config = base_config();
    config.connector_tokens = Vec::new();
    let state = BrokerState::new(config, Some(ConnectorStore::load(None)), Default::default(), CancellationToken::new());
    match decide_admission(&state, &auth(Some("ck-0000000000000000000000000000aa"), &["m1"])) {
        Admission::Pending { .. } => {}
        _ => panic!("expected Pending"),
    }
}

#[test]
fn approval_workflow_mode_approved_token_is_accepted() {
    let config = base_config();
    let store = ConnectorStore::load(None);
    let record = store.create_pending(vec!["m1".into()], None);
    let key = store.approve(&record.connector_id).unwrap();
    let state = BrokerState::new(config, Some(store), Default::default(), CancellationToken::new());

    match decide_admission(&state, &auth(Some(&key), &["m1"])) {
        Admission::Accepted { connector_id, upstream_api_key } => {
            assert_eq!(connector_id, record.connector_id);
            assert!(upstream_api_key.is_none());
        }
        _ => panic!("expected Accepted"),
    }
}

#[test]
fn approval_workflow_mode_revoked_token_is_rejected() {
    let config = base_config();
    let store = ConnectorStore::load(None);
    let record = store.create_pending(vec!["m1".into()], None);
    let key = store.approve(&record.connector_id).unwrap();
    store.revoke(&record.connector_id);
    let state = BrokerState::new(config, Some(store), Default::default(), CancellationToken::new());

    match decide_admission(&state, &auth(Some(&key), &["m1"])) {
        Admission::Rejected { .. } => {}
        _ => panic!("expected Rejected"),
    }
}

#[test]
fn legacy_mode_with_no_configured_tokens_accepts_anything() {
    let mut config = base_config();
    config.connector_tokens = Vec::new();
    let state = BrokerState::new(config, None, Default::default(), CancellationToken::new());

    match decide_admission(&state, &auth(None, &["m1"])) {
        Admission::Accepted { .. } => {}
        _ => panic!("expected Accepted"),
    }
}

#[test]
fn legacy_mode_matches_configured_token_and_maps_upstream_key() {
    let mut config = base_config();
    config.connector_tokens = vec!["legacy-token".to_owned()];
    let mut connector_config = std::collections::HashMap::new();
    connector_config.insert("legacy-token".to_owned(), "sk-upstream".to_owned());
    let state = BrokerState::new(config, None, connector_config, CancellationToken::new());

    match decide_admission(&state, &auth(Some("legacy-token"), &["m1"])) {
        Admission::Accepted { upstream_api_key, .. } => assert_eq!(upstream_api_key.as_deref(), Some("sk-upstream")),
        _ => panic!("expected Accepted"),
    }
}

#[test]
fn legacy_mode_rejects_unknown_token_when_tokens_are_configured() {
    let mut config = base_config();
    config.connector_tokens = vec!["legacy-token".to_owned()];
    let state = BrokerState::new(config, None, Default::default(), CancellationToken::new());

    match decide_admission(&state, &auth(Some("wrong"), &["m1"])) {
        Admission::Rejected { .. } => {}
        _ => panic!("expected Rejected"),
    }
}
