use super::*;

#[test]
fn connector_disconnected_maps_to_502_bad_gateway() {
    let err = BrokerError::ConnectorDisconnected;
    assert_eq!(err.http_status(), 502);
    assert_eq!(err.as_str(), "connector_unavailable");
    assert_eq!(err.as_type(), "bad_gateway");
}

#[test]
fn connector_unavailable_maps_to_503_service_unavailable() {
    let err = BrokerError::ConnectorUnavailable;
    assert_eq!(err.http_status(), 503);
    assert_eq!(err.as_str(), "connector_unavailable");
    assert_eq!(err.as_type(), "service_unavailable");
}

#[test]
fn both_connector_error_kinds_share_one_code_but_differ_in_status_and_type() {
    assert_eq!(BrokerError::ConnectorUnavailable.as_str(), BrokerError::ConnectorDisconnected.as_str());
    assert_ne!(BrokerError::ConnectorUnavailable.http_status(), BrokerError::ConnectorDisconnected.http_status());
    assert_ne!(BrokerError::ConnectorUnavailable.as_type(), BrokerError::ConnectorDisconnected.as_type());
}

#[test]
fn invalid_api_key_uses_authentication_error_type() {
    assert_eq!(BrokerError::InvalidApiKey.as_type(), "authentication_error");
}

#[test]
fn timeout_type_matches_its_code() {
    assert_eq!(BrokerError::Timeout.as_type(), "timeout");
    assert_eq!(BrokerError::Timeout.as_type(), BrokerError::Timeout.as_str());
}

#[test]
fn llm_error_type_reuses_its_code_rather_than_invalid_request_error() {
    let err = BrokerError::LlmError(418);
    assert_eq!(err.http_status(), 418);
    assert_eq!(err.as_type(), "llm_error");
    assert_eq!(err.as_type(), err.as_str());
}

#[test]
fn to_error_body_carries_the_varying_type_not_a_constant() {
    let body = BrokerError::InvalidApiKey.to_error_body("bad key");
    assert_eq!(body.r#type, "authentication_error");
    assert_eq!(body.code, "invalid_api_key");
    assert_eq!(body.message, "bad key");
}
