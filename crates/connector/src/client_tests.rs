use super::*;
use proptest::prelude::*;
use remotellm_protocol::{AuthFailPayload, AuthOkPayload, PendingPayload};

#[test]
fn reconnect_delay_grows_then_caps() {
    let base = Duration::from_secs(1);
    let max = Duration::from_secs(60);
    let d1 = next_reconnect_delay(1, base, max, 0.0);
    let d2 = next_reconnect_delay(2, base, max, 0.0);
    let d3 = next_reconnect_delay(3, base, max, 0.0);
    assert_eq!(d1, Duration::from_secs(1));
    assert_eq!(d2, Duration::from_secs(2));
    assert_eq!(d3, Duration::from_secs(4));

    let capped = next_reconnect_delay(20, base, max, 0.0);
    assert_eq!(capped, max);
}

#[test]
fn reconnect_delay_jitter_stays_within_bounds() {
    let base = Duration::from_secs(1);
    let max = Duration::from_secs(60);
    let no_jitter = next_reconnect_delay(4, base, max, 0.0);
    let full_jitter = next_reconnect_delay(4, base, max, 1.0);
    assert!(full_jitter > no_jitter);
    assert!(full_jitter <= no_jitter + no_jitter.mul_f64(0.25) + Duration::from_millis(1));
}

#[test]
fn reconnect_delay_jitter_is_clamped_to_non_negative_range() {
    let base = Duration::from_secs(1);
    let max = Duration::from_secs(60);
    let below = next_reconnect_delay(1, base, max, -1.0);
    let above = next_reconnect_delay(1, base, max, 2.0);
    assert_eq!(below, Duration::from_secs(1));
    assert_eq!(above, next_reconnect_delay(1, base, max, 1.0));
}

#[test]
fn auth_ok_is_accepted() {
    let payload = Payload::AuthOk(AuthOkPayload { session_id: "sess-1".into() });
    match classify_auth_reply(&payload) {
        AuthDecision::Accepted(session_id) => assert_eq!(session_id, "sess-1"),
        _ => panic!("expected Accepted"),
    }
}

#[test]
fn pending_is_pending() {
    let payload = Payload::Pending(PendingPayload { connector_id: "conn-aaaaaaaa".into(), message: "awaiting approval".into() });
    match classify_auth_reply(&payload) {
        AuthDecision::Pending(connector_id) => assert_eq!(connector_id, "conn-aaaaaaaa"),
        _ => panic!("expected Pending"),
    }
}

#[test]
fn auth_fail_is_rejected() {
    let payload = Payload::AuthFail(AuthFailPayload { error: "bad token".into() });
    assert!(matches!(classify_auth_reply(&payload), AuthDecision::Rejected));
}

#[test]
fn unexpected_reply_is_rejected() {
    let payload = Payload::Ping(EmptyPayload {});
    assert!(matches!(classify_auth_reply(&payload), AuthDecision::Rejected));
}

#[test]
fn streaming_flag_detected_from_body() {
    assert!(is_streaming_request(br#"{"model":"m","stream":true}"#));
    assert!(!is_streaming_request(br#"{"model":"m","stream":false}"#));
    assert!(!is_streaming_request(br#"{"model":"m"}"#));
}

#[test]
fn malformed_body_is_not_streaming() {
    assert!(!is_streaming_request(b"not json"));
    assert!(!is_streaming_request(b""));
}

fn test_config(broker_token: Option<String>, credentials_file: Option<std::path::PathBuf>) -> ConnectorConfig {
    ConnectorConfig {
        broker_url: "ws://localhost:1/ws".into(),
        broker_token,
        credentials_file,
        display_name: None,
        models_override: Vec::new(),
        upstream_url: "http://localhost:1".into(),
        upstream_api_key: None,
        upstream_host_header: None,
        upstream_ssl_verify: true,
        reconnect_base_delay_ms: 1_000,
        reconnect_max_delay_ms: 300_000,
        keepalive_interval_ms: 60_000,
        upstream_timeout_ms: 300_000,
        connect_timeout_ms: 30_000,
        auth_timeout_ms: 10_000,
        drain_timeout_ms: 30_000,
        connector_version: "test".into(),
        log_level: "info".into(),
    }
}

fn test_upstream() -> Arc<UpstreamClient> {
    Arc::new(UpstreamClient::new("http://localhost:1", Duration::from_secs(1), true, None).unwrap())
}

#[tokio::test]
async fn new_loads_broker_token_from_credentials_file_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    credentials::save(&path, "ck-0123456789abcdef0123456789abcdef").unwrap();

    let config = test_config(None, Some(path));
    let client = RelayClient::new(config, test_upstream(), Vec::new());
    assert_eq!(client.broker_token().await, Some("ck-0123456789abcdef0123456789abcdef".to_owned()));
}

#[tokio::test]
async fn new_prefers_explicit_token_over_credentials_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    credentials::save(&path, "ck-ffffffffffffffffffffffffffffffff").unwrap();

    let config = test_config(Some("ck-0123456789abcdef0123456789abcdef".to_owned()), Some(path));
    let client = RelayClient::new(config, test_upstream(), Vec::new());
    assert_eq!(client.broker_token().await, Some("ck-0123456789abcdef0123456789abcdef".to_owned()));
}

#[tokio::test]
async fn new_with_no_token_and_no_file_starts_unapproved() {
    let config = test_config(None, None);
    let client = RelayClient::new(config, test_upstream(), Vec::new());
    assert_eq!(client.broker_token().await, None);
}

proptest! {
    #[test]
    fn reconnect_delay_is_monotone_non_decreasing_up_to_the_cap(
        attempt in 1u32..30,
        jitter in 0.0f64..1.0,
    ) {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(120);
        let this = next_reconnect_delay(attempt, base, max, jitter);
        let next = next_reconnect_delay(attempt + 1, base, max, 0.0);
        // `next` uses zero jitter so a monotone comparison can't be defeated
        // by `this` rolling the maximum 25% jitter at a smaller exponent.
        let max_with_jitter = max.mul_f64(1.25) + Duration::from_millis(1);
        prop_assert!(this <= max_with_jitter);
        prop_assert!(next >= next_reconnect_delay(attempt, base, max, 0.0));
    }
}
