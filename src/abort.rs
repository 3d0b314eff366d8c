use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{ChatError, ChatResult};

/// Cooperative stop signals for in-flight generations, keyed by generation id.
///
/// A fired signal aborts the provider stream; partial text already produced
/// still reaches the finalize stage.
#[derive(Clone, Default)]
pub struct AbortRegistry {
    inner: Arc<Mutex<HashMap<String, oneshot::Sender<()>>>>,
}

impl AbortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generation; the receiver fires when `abort` is called.
    /// Re-registering the same id replaces the previous handle.
    pub fn register(&self, generation_id: &str) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut map) = self.inner.lock() {
            map.insert(generation_id.to_string(), tx);
        }
        rx
    }

    pub fn abort(&self, generation_id: &str) -> ChatResult<()> {
        let handle = self
            .inner
            .lock()
            .map_err(|e| ChatError::Storage(format!("abort registry lock poisoned: {}", e)))?
            .remove(generation_id);
        match handle {
            Some(tx) => {
                // Receiver may already be gone if the stream just finished.
                let _ = tx.send(());
                Ok(())
            }
            None => Err(ChatError::NotFound(format!(
                "generation {} not found or already completed",
                generation_id
            ))),
        }
    }

    pub fn unregister(&self, generation_id: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(generation_id);
        }
    }
}
