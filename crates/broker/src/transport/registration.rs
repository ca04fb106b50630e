// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound API used by the HTTP edge (C6) to talk to a live registration,
//! and inbound dispatch of frames received from the connector's socket.

use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::SinkExt;
use remotellm_protocol::{Envelope, Payload};
use tokio::sync::{mpsc, oneshot};

use crate::state::{ExchangeError, PendingExchanges, PendingOneResult, Registration, StreamItem};

/// Write one envelope to the connector's socket.
pub async fn send_envelope(registration: &Registration, envelope: &Envelope) -> Result<(), ()> {
    let frame = envelope.to_frame().map_err(|_| ())?;
    let mut sink = registration.sink.lock().await;
    sink.send(Message::Text(frame.into())).await.map_err(|_| ())
}

/// Send a `REQUEST` and await its single-slot completion, or time out.
pub async fn send_request(registration: &Registration, envelope: Envelope, timeout: Duration) -> PendingOneResult {
    let (tx, rx) = oneshot::channel();
    registration.exchanges.pending_one.lock().await.insert(envelope.id.clone(), tx);

    if send_envelope(registration, &envelope).await.is_err() {
        registration.exchanges.pending_one.lock().await.remove(&envelope.id);
        return Err(ExchangeError::Disconnected);
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ExchangeError::Disconnected),
        Err(_) => {
            registration.exchanges.pending_one.lock().await.remove(&envelope.id);
            Err(ExchangeError::Timeout)
        }
    }
}

/// Send a `REQUEST` and return a channel that yields `STREAM_CHUNK`/`ERROR`
/// envelopes until the end-of-stream sentinel (`None`).
pub async fn send_request_stream(
    registration: &Registration,
    envelope: Envelope,
) -> Result<mpsc::UnboundedReceiver<StreamItem>, ()> {
    let (tx, rx) = mpsc::unbounded_channel();
    registration.exchanges.pending_stream.lock().await.insert(envelope.id.clone(), tx);

    if send_envelope(registration, &envelope).await.is_err() {
        registration.exchanges.pending_stream.lock().await.remove(&envelope.id);
        return Err(());
    }

    Ok(rx)
}

/// Dispatch one inbound envelope from the connector to the pending exchange
/// it completes, per SPEC §4.5's message-loop rules. Frames with no matching
/// correlation id are logged and dropped.
pub async fn dispatch_inbound(exchanges: &PendingExchanges, connector_id: &str, envelope: Envelope) {
    let id = envelope.id.clone();
    match &envelope.payload {
        Payload::Response(_) | Payload::Error(_) => {
            if let Some(tx) = exchanges.pending_one.lock().await.remove(&id) {
                let _ = tx.send(Ok(envelope));
                return;
            }
            if let Some(tx) = exchanges.pending_stream.lock().await.remove(&id) {
                let _ = tx.send(Some(envelope));
                let _ = tx.send(None);
                return;
            }
            tracing::debug!(correlation_id = %id, "dropped frame with no matching pending exchange");
        }
        Payload::StreamChunk(_) => {
            let streams = exchanges.pending_stream.lock().await;
            if let Some(tx) = streams.get(&id) {
                let _ = tx.send(Some(envelope));
            } else {
                tracing::debug!(correlation_id = %id, "dropped stream chunk with no matching exchange");
            }
        }
        Payload::StreamEnd(_) => {
            if let Some(tx) = exchanges.pending_stream.lock().await.remove(&id) {
                let _ = tx.send(None);
            } else {
                tracing::debug!(correlation_id = %id, "dropped stream end with no matching exchange");
            }
        }
        Payload::Pong(_) => {
            tracing::debug!(connector_id, "pong received");
        }
        other => {
            tracing::debug!(connector_id, frame_type = other.type_name(), "unexpected frame from connector");
        }
    }
}

/// Fail every outstanding exchange. Called once the owning socket has closed.
pub async fn drain_on_disconnect(exchanges: &PendingExchanges) {
    let mut pending_one = exchanges.pending_one.lock().await;
    for (_, tx) in pending_one.drain() {
        let _ = tx.send(Err(ExchangeError::Disconnected));
    }
    drop(pending_one);

    let mut pending_stream = exchanges.pending_stream.lock().await;
    for (_, tx) in pending_stream.drain() {
        let _ = tx.send(None);
    }
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
