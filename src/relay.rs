use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::RelaySettings;
use crate::error::{ChatError, ChatResult};

/// One line-delimited frame of the stream relay protocol.
///
/// `success: true` with a non-empty `result` carries a text delta;
/// `success: true` with an empty `result` is the terminal commit
/// acknowledgment (empty deltas are never emitted, so the shape is
/// unambiguous); `success: false` is the terminal error frame. A connection
/// that closes without any terminal frame is an ambiguous outcome and the
/// client must not assume the message was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayFrame {
    pub success: bool,
    pub result: String,
}

impl RelayFrame {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            success: true,
            result: text.into(),
        }
    }

    pub fn committed() -> Self {
        Self {
            success: true,
            result: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.success || self.result.is_empty()
    }

    /// Wire encoding: one JSON object per line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).expect("frame serializes");
        line.push('\n');
        line
    }
}

/// Producer half of the relay channel. Single producer (the orchestrator),
/// single consumer (the network connection held by the caller). Buffering is
/// bounded: a consumer that stalls past the send timeout cancels the
/// generation instead of growing memory.
pub struct RelaySender {
    tx: mpsc::Sender<RelayFrame>,
    send_timeout: Duration,
}

impl RelaySender {
    pub fn channel(settings: &RelaySettings) -> (RelaySender, mpsc::Receiver<RelayFrame>) {
        let (tx, rx) = mpsc::channel(settings.capacity.max(1));
        (
            RelaySender {
                tx,
                send_timeout: Duration::from_millis(settings.send_timeout_ms),
            },
            rx,
        )
    }

    pub async fn send(&self, frame: RelayFrame) -> ChatResult<()> {
        match self.tx.send_timeout(frame, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                debug!("relay consumer stalled past send timeout");
                Err(ChatError::Relay("client too slow, relay buffer full".into()))
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                debug!("relay consumer disconnected");
                Err(ChatError::Relay("client disconnected".into()))
            }
        }
    }
}
