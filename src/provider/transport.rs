use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::sse::{self, SseDecoder};
use super::{DeltaStream, StreamEvent};
use crate::error::{ChatError, ChatResult, ProviderError};

/// Events buffered between the HTTP read loop and the consumer.
const DRIVER_CHANNEL_CAPACITY: usize = 256;

pub fn build_client(connect_timeout_ms: u64) -> ChatResult<reqwest::Client> {
    // Only the connect phase gets a client-level timeout; a whole-request
    // timeout would kill long-lived streams. Per-delta reads are bounded in
    // the driver loop instead.
    reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(connect_timeout_ms))
        .build()
        .map_err(ChatError::from)
}

/// Issue the streaming POST and fail fast on a non-success status, with the
/// vendor's error message when one can be extracted from the body.
pub async fn send_streaming(
    client: &reqwest::Client,
    url: &str,
    headers: HashMap<String, String>,
    body: &Value,
) -> ChatResult<reqwest::Response> {
    let mut header_map = HeaderMap::new();
    for (name, value) in &headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ChatError::InvalidConfig(format!("bad header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ChatError::InvalidConfig(format!("bad header value: {}", e)))?;
        header_map.insert(name, value);
    }

    let response = client.post(url).headers(header_map).json(body).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let fallback = format!("provider returned status {}", status.as_u16());
    let message = response
        .text()
        .await
        .ok()
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .and_then(|v| sse::extract_error_message(&v))
        .unwrap_or(fallback);
    Err(ChatError::Provider(ProviderError::from_status(
        status.as_u16(),
        message,
    )))
}

/// Read the response body as an SSE stream on a separate task, pushing
/// normalized events through a bounded channel. The loop ends on upstream
/// EOF, a `[DONE]` sentinel, a read timeout, a transport error or an abort
/// signal; exactly one terminal event is emitted.
pub fn spawn_driver(
    response: reqwest::Response,
    mut abort: oneshot::Receiver<()>,
    delta_timeout_ms: u64,
) -> DeltaStream {
    let (tx, stream) = DeltaStream::channel(DRIVER_CHANNEL_CAPACITY);
    let delta_timeout = Duration::from_millis(delta_timeout_ms);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        loop {
            let chunk: Option<Result<bytes::Bytes, reqwest::Error>> = tokio::select! {
                _ = &mut abort => {
                    debug!("stream aborted by caller");
                    let _ = tx.send(StreamEvent::Aborted).await;
                    return;
                }
                read = timeout(delta_timeout, body.next()) => match read {
                    Ok(chunk) => chunk,
                    Err(_) => {
                        warn!("per-delta read timeout tripped mid-stream");
                        let _ = tx
                            .send(StreamEvent::Error(ProviderError::transient(
                                "timed out waiting for the next delta",
                            )))
                            .await;
                        return;
                    }
                },
            };
            match chunk {
                Some(Ok(bytes)) => {
                    let text = String::from_utf8_lossy(&bytes);
                    for event in decoder.feed(&text) {
                        let terminal = matches!(
                            event,
                            StreamEvent::Done | StreamEvent::Error(_) | StreamEvent::Aborted
                        );
                        if tx.send(event).await.is_err() {
                            // Consumer gone; nothing left to relay.
                            return;
                        }
                        if terminal {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "transport error mid-stream");
                    let _ = tx
                        .send(StreamEvent::Error(ProviderError::transient(e.to_string())))
                        .await;
                    return;
                }
                None => {
                    // Clean EOF without an explicit sentinel still completes
                    // the sequence.
                    let _ = tx.send(StreamEvent::Done).await;
                    return;
                }
            }
        }
    });

    stream
}
