use super::*;
use axum::http::HeaderValue;
use remotellm_protocol::{EmptyPayload, ErrorPayload, StreamChunkPayload};

#[test]
fn passthrough_headers_drops_host_connection_and_authorization() {
    let mut headers = HeaderMap::new();
    headers.insert("host", HeaderValue::from_static("example.com"));
    headers.insert("connection", HeaderValue::from_static("keep-alive"));
    headers.insert("authorization", HeaderValue::from_static("Bearer sk-x"));
    headers.insert("x-request-id", HeaderValue::from_static("abc"));

    let filtered = passthrough_headers(&headers);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered.get("x-request-id").map(String::as_str), Some("abc"));
}

#[test]
fn chunk_bytes_passes_stream_chunk_text_through_verbatim() {
    let envelope = Envelope::new("c1", Payload::StreamChunk(StreamChunkPayload { chunk: "data: hi\n\n".into(), done: false }));
    let bytes = chunk_bytes(envelope);
    assert_eq!(&bytes[..], b"data: hi\n\n");
}

#[test]
fn chunk_bytes_renders_error_as_one_sse_line() {
    let envelope = Envelope::new("c1", Payload::Error(ErrorPayload { status: 502, error: "boom".into(), code: "connector_unavailable".into() }));
    let bytes = chunk_bytes(envelope);
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("data: "));
    assert!(text.ends_with("\n\n"));
    assert!(text.contains("connector_unavailable"));
    let value: serde_json::Value = serde_json::from_str(text.trim_start_matches("data: ").trim_end()).unwrap();
    assert_eq!(value["error"]["type"], "connector_unavailable");
    assert_eq!(value["error"]["code"], "connector_unavailable");
}

#[test]
fn chunk_bytes_is_empty_for_unrelated_payloads() {
    let envelope = Envelope::new("c1", Payload::Pong(EmptyPayload {}));
    assert!(chunk_bytes(envelope).is_empty());
}
