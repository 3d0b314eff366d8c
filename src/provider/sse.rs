use serde_json::Value;

use super::StreamEvent;
use crate::error::ProviderError;
use crate::types::UsageSummary;

/// Buffered SSE decoder tolerant of JSON payloads split across chunk
/// boundaries, normalizing vendor stream shapes (OpenAI deltas, Anthropic
/// content-block events, Gemini candidates) into `StreamEvent`s.
#[derive(Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk, returning all complete events parsed from it.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        let mut consumed = 0usize;
        for (idx, ch) in self.buffer.char_indices() {
            if ch != '\n' {
                continue;
            }
            let line = self.buffer[consumed..idx].trim();
            consumed = idx + 1;
            let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
                continue;
            };
            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                events.push(StreamEvent::Done);
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(payload) else {
                events.push(StreamEvent::Error(ProviderError::malformed(format!(
                    "unparseable stream payload: {:.120}",
                    payload
                ))));
                continue;
            };
            if let Some(message) = extract_error_message(&value) {
                events.push(StreamEvent::Error(classify_error(&value, message)));
                continue;
            }
            if let Some(text) = extract_text(&value) {
                if !text.is_empty() {
                    events.push(StreamEvent::Delta(text));
                }
            }
            if let Some(usage) = extract_usage(&value) {
                events.push(StreamEvent::Usage(usage));
            }
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        events
    }
}

fn extract_text(v: &Value) -> Option<String> {
    // OpenAI streaming: choices[0].delta.content
    if let Some(s) = v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|t| t.as_str())
    {
        return Some(s.to_string());
    }
    // OpenAI non-streaming fallback: choices[0].message.content
    if let Some(s) = v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Some(s.to_string());
    }
    // Anthropic Messages API: content_block_delta -> delta -> text
    if v.get("type").and_then(|t| t.as_str()) == Some("content_block_delta") {
        if let Some(s) = v
            .get("delta")
            .and_then(|d| d.get("text"))
            .and_then(|t| t.as_str())
        {
            return Some(s.to_string());
        }
    }
    // Gemini: candidates[].content.parts[].text, skipping thought parts
    if let Some(candidates) = v.get("candidates").and_then(|c| c.as_array()) {
        let mut combined = String::new();
        for candidate in candidates {
            if let Some(parts) = candidate
                .get("content")
                .and_then(|c| c.get("parts"))
                .and_then(|p| p.as_array())
            {
                for part in parts {
                    if part.get("thought").and_then(|t| t.as_bool()).unwrap_or(false) {
                        continue;
                    }
                    if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                        combined.push_str(text);
                    }
                }
            }
        }
        if !combined.is_empty() {
            return Some(combined);
        }
    }
    None
}

fn take_first(map: &Value, keys: &[&str]) -> Option<u64> {
    for key in keys {
        if let Some(value) = map.get(*key) {
            if let Some(n) = value.as_u64() {
                return Some(n);
            }
            if let Some(s) = value.as_str() {
                if let Ok(n) = s.trim().parse::<u64>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

pub fn extract_usage(v: &Value) -> Option<UsageSummary> {
    // OpenAI "usage", Gemini "usageMetadata", Anthropic nests the prompt
    // side under message_start's message.usage.
    let u = v
        .get("usage")
        .or_else(|| v.get("usageMetadata"))
        .or_else(|| v.get("message").and_then(|m| m.get("usage")))?;

    let prompt_tokens = take_first(
        u,
        &["prompt_tokens", "input_tokens", "promptTokens", "promptTokenCount"],
    );
    let completion_tokens = take_first(
        u,
        &[
            "completion_tokens",
            "output_tokens",
            "completionTokens",
            "candidatesTokenCount",
        ],
    );
    let total_tokens = take_first(u, &["total_tokens", "totalTokens", "totalTokenCount"]).or_else(
        || match (prompt_tokens, completion_tokens) {
            (Some(p), Some(c)) => Some(p + c),
            _ => None,
        },
    );

    if prompt_tokens.is_none() && completion_tokens.is_none() && total_tokens.is_none() {
        None
    } else {
        Some(UsageSummary {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }
}

/// Map an in-band vendor error object onto the transient/permanent split.
/// A numeric `error.code` is treated like an HTTP status; otherwise string
/// fields and the message are scanned for rate-limit/overload shapes so the
/// caller's pre-frame retry can apply to them.
fn classify_error(v: &Value, message: String) -> ProviderError {
    let err = v.get("error");
    if let Some(code) = err.and_then(|e| e.get("code")).and_then(|c| c.as_u64()) {
        if let Ok(status) = u16::try_from(code) {
            return ProviderError::from_status(status, message);
        }
    }
    let hints = [
        err.and_then(|e| e.get("type")).and_then(|t| t.as_str()),
        err.and_then(|e| e.get("code")).and_then(|c| c.as_str()),
        err.and_then(|e| e.get("status")).and_then(|s| s.as_str()),
        Some(message.as_str()),
    ]
    .iter()
    .flatten()
    .map(|s| s.to_lowercase())
    .collect::<Vec<_>>()
    .join(" ");
    const TRANSIENT_HINTS: &[&str] = &[
        "rate limit",
        "rate_limit",
        "overloaded",
        "timeout",
        "timed out",
        "unavailable",
        "resource_exhausted",
    ];
    if TRANSIENT_HINTS.iter().any(|h| hints.contains(h)) {
        ProviderError::transient(message)
    } else {
        ProviderError::permanent(message)
    }
}

/// Pull a human-readable error out of a vendor payload: an `error` object
/// mid-stream (OpenAI, Anthropic) or a Gemini block reason.
pub fn extract_error_message(v: &Value) -> Option<String> {
    if let Some(err) = v.get("error") {
        if let Some(s) = err.get("message").and_then(|m| m.as_str()) {
            if !s.trim().is_empty() {
                return Some(s.trim().to_string());
            }
        }
        if let Some(s) = err.as_str() {
            if !s.trim().is_empty() {
                return Some(s.trim().to_string());
            }
        }
        return Some("provider reported an unspecified error".to_string());
    }
    if v.get("type").and_then(|t| t.as_str()) == Some("error") {
        if let Some(s) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return Some(s.to_string());
        }
    }
    if let Some(reason) = v
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Some(format!(
            "content blocked by provider: {}",
            reason.replace('_', " ").to_lowercase()
        ));
    }
    None
}
