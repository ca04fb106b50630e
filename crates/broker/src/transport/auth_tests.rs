use super::*;
use axum::http::HeaderValue;

fn headers_with_bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
    headers
}

#[test]
fn empty_key_set_disables_auth() {
    assert!(validate_bearer(&HeaderMap::new(), &[]).is_ok());
}

#[test]
fn missing_header_is_rejected_when_keys_configured() {
    let keys = vec!["sk-abc".to_owned()];
    assert_eq!(validate_bearer(&HeaderMap::new(), &keys), Err(BrokerError::InvalidApiKey));
}

#[test]
fn matching_bearer_token_is_accepted() {
    let keys = vec!["sk-abc".to_owned(), "sk-def".to_owned()];
    assert!(validate_bearer(&headers_with_bearer("sk-def"), &keys).is_ok());
}

#[test]
fn wrong_token_is_rejected() {
    let keys = vec!["sk-abc".to_owned()];
    assert_eq!(validate_bearer(&headers_with_bearer("sk-wrong"), &keys), Err(BrokerError::InvalidApiKey));
}
