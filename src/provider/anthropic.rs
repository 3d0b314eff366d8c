use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use super::ProviderAdapter;
use crate::types::{ChatMessage, GenerationParams, Role};

pub struct AnthropicAdapter;

#[derive(Serialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContent>,
}

#[derive(Serialize)]
struct AnthropicMessagesRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

impl ProviderAdapter for AnthropicAdapter {
    fn default_base_url(&self) -> &'static str {
        "https://api.anthropic.com"
    }

    fn endpoint(&self, base_url: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.ends_with("/v1") {
            format!("{}/messages", trimmed)
        } else {
            format!("{}/v1/messages", trimmed)
        }
    }

    fn headers(
        &self,
        api_key: &str,
        extra: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String> {
        let mut out: HashMap<String, String> = HashMap::new();
        out.insert("x-api-key".into(), api_key.to_string());
        out.insert("Content-Type".into(), "application/json".into());
        out.insert("Accept".into(), "text/event-stream".into());
        out.insert("anthropic-version".into(), "2023-06-01".into());
        out.entry("User-Agent".into())
            .or_insert_with(|| "chatrelay/0.1".into());
        if let Some(extra) = extra {
            for (k, v) in extra.iter() {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }

    fn body(&self, model_name: &str, messages: &[ChatMessage], params: &GenerationParams) -> Value {
        // The messages API wants the system prompt as a top-level field, not
        // as a message, and only knows user/assistant roles in the turn list.
        let mut msgs: Vec<AnthropicMessage> = Vec::new();
        for msg in messages {
            if msg.role == Role::System || msg.text.is_empty() {
                continue;
            }
            let role = match msg.role {
                Role::Assistant => "assistant",
                _ => "user",
            };
            msgs.push(AnthropicMessage {
                role: role.to_string(),
                content: vec![AnthropicContent {
                    kind: "text",
                    text: msg.text.clone(),
                }],
            });
        }

        let system = params
            .system_prompt
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let body = AnthropicMessagesRequest {
            model: model_name.to_string(),
            messages: msgs,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stream: true,
            system,
        };

        serde_json::to_value(body).unwrap_or_else(|_| json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_handles_versioned_and_bare_base() {
        let adapter = AnthropicAdapter;
        assert_eq!(
            adapter.endpoint("https://api.anthropic.com"),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            adapter.endpoint("https://gateway.local/v1/"),
            "https://gateway.local/v1/messages"
        );
    }

    #[test]
    fn body_lifts_system_prompt_out_of_messages() {
        let adapter = AnthropicAdapter;
        let messages = vec![
            ChatMessage::text(Role::User, "hello"),
            ChatMessage::text(Role::Assistant, "hi there"),
            ChatMessage::text(Role::User, "and now?"),
        ];
        let params = GenerationParams {
            system_prompt: Some("stay in character".into()),
            max_tokens: 512,
            ..Default::default()
        };
        let body = adapter.body("claude-3-5-haiku", &messages, &params);
        assert_eq!(body["system"], "stay in character");
        assert_eq!(body["max_tokens"], 512);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(msgs[1]["content"][0]["text"], "hi there");
    }

    #[test]
    fn headers_carry_version_and_key() {
        let adapter = AnthropicAdapter;
        let headers = adapter.headers("sk-ant", None);
        assert_eq!(headers["x-api-key"], "sk-ant");
        assert_eq!(headers["anthropic-version"], "2023-06-01");
    }
}
