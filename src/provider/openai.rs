use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use super::ProviderAdapter;
use crate::types::{ChatMessage, GenerationParams, Role};

/// OpenAI chat completions wire shape. Also the fallback for any provider id
/// without a dedicated adapter, since most vendors imitate this API.
pub struct OpenAiAdapter;

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

impl ProviderAdapter for OpenAiAdapter {
    fn default_base_url(&self) -> &'static str {
        "https://api.openai.com/v1"
    }

    fn endpoint(&self, base_url: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.ends_with("/chat/completions") {
            trimmed.to_string()
        } else {
            format!("{}/chat/completions", trimmed)
        }
    }

    fn headers(
        &self,
        api_key: &str,
        extra: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String> {
        let mut out: HashMap<String, String> = HashMap::new();
        out.insert("Authorization".into(), format!("Bearer {}", api_key));
        out.insert("Content-Type".into(), "application/json".into());
        out.insert("Accept".into(), "text/event-stream".into());
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
        let mut msgs: Vec<OpenAiMessage> = Vec::new();
        if let Some(prompt) = params.system_prompt.as_deref() {
            if !prompt.is_empty() {
                msgs.push(OpenAiMessage {
                    role: self.system_role().to_string(),
                    content: prompt.to_string(),
                });
            }
        }
        for msg in messages {
            if msg.role == Role::System {
                continue;
            }
            msgs.push(OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: msg.text.clone(),
            });
        }

        let body = OpenAiChatRequest {
            model: model_name.to_string(),
            messages: msgs,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        };

        serde_json::to_value(body).unwrap_or_else(|_| json!({}))
    }
}
