use std::path::PathBuf;
use std::sync::Mutex;

use tokenizers::Tokenizer;

use crate::error::{ChatError, ChatResult};
use crate::types::ChatMessage;

/// Fixed per-message overhead applied by the chat-template heuristic
/// (role tag, separators). Matches the OpenAI chat-format approximation.
const MESSAGE_OVERHEAD_TOKENS: u64 = 4;

/// Local token counter for adapters whose providers report no usage.
///
/// Loads a HuggingFace `tokenizer.json` lazily on first use; when no
/// tokenizer file is configured, falls back to a bytes/4 heuristic. The
/// fallback deliberately never undercounts non-empty text to zero, since a
/// partial stream must still produce a positive debit.
pub struct TokenEstimator {
    path: Option<PathBuf>,
    tokenizer: Mutex<Option<Tokenizer>>,
}

impl TokenEstimator {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            tokenizer: Mutex::new(None),
        }
    }

    /// Estimator with no tokenizer file, heuristic only.
    pub fn heuristic() -> Self {
        Self::new(None)
    }

    pub fn count(&self, text: &str) -> ChatResult<u64> {
        if text.is_empty() {
            return Ok(0);
        }
        let Some(path) = &self.path else {
            return Ok(heuristic_count(text));
        };
        let mut guard = self
            .tokenizer
            .lock()
            .map_err(|e| ChatError::InvalidConfig(format!("tokenizer lock poisoned: {}", e)))?;
        if guard.is_none() {
            let tokenizer = Tokenizer::from_file(path).map_err(|e| {
                ChatError::InvalidConfig(format!(
                    "loading tokenizer from {}: {}",
                    path.display(),
                    e
                ))
            })?;
            *guard = Some(tokenizer);
        }
        let tokenizer = guard.as_ref().expect("tokenizer initialized above");
        let encoding = tokenizer
            .encode(text, false)
            .map_err(|e| ChatError::InvalidConfig(format!("tokenization failed: {}", e)))?;
        Ok(encoding.get_ids().len() as u64)
    }

    /// Prompt-side estimate for a normalized message list plus optional
    /// system prompt, with per-message chat-format overhead.
    pub fn count_messages(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> ChatResult<u64> {
        let mut total = 0u64;
        if let Some(prompt) = system_prompt {
            if !prompt.is_empty() {
                total += MESSAGE_OVERHEAD_TOKENS + self.count(prompt)?;
            }
        }
        for message in messages {
            total += MESSAGE_OVERHEAD_TOKENS + self.count(&message.text)?;
        }
        Ok(total)
    }
}

fn heuristic_count(text: &str) -> u64 {
    ((text.len() as u64) / 4).max(1)
}
