use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use super::ProviderAdapter;
use crate::types::{ChatMessage, GenerationParams, Role};

pub struct GoogleGeminiAdapter;

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct GeminiGoogleSearch {}

#[derive(Serialize)]
struct GeminiTool {
    #[serde(rename = "googleSearch")]
    google_search: GeminiGoogleSearch,
}

#[derive(Serialize)]
struct GeminiChatRequest {
    contents: Vec<GeminiContent>,
    #[serde(
        rename = "systemInstruction",
        skip_serializing_if = "Option::is_none"
    )]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

impl ProviderAdapter for GoogleGeminiAdapter {
    fn default_base_url(&self) -> &'static str {
        "https://generativelanguage.googleapis.com/v1beta"
    }

    fn endpoint(&self, base_url: &str) -> String {
        base_url.trim_end_matches('/').to_string()
    }

    // Gemini wants the model and API key in the URL:
    // /v1beta/models/{model}:streamGenerateContent?alt=sse&key={key}
    fn build_url(&self, base_url: &str, model_name: &str, api_key: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        // Upgrade only a bare "/v1" suffix; "/v1beta" passes through as-is.
        let base = match trimmed.strip_suffix("/v1") {
            Some(stripped) => format!("{}/v1beta", stripped),
            None => trimmed.to_string(),
        };
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            base, model_name, api_key
        )
    }

    fn headers(
        &self,
        _api_key: &str,
        extra: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String> {
        // Auth rides in the URL query, not in a header.
        let mut out: HashMap<String, String> = HashMap::new();
        out.insert("Content-Type".into(), "application/json".into());
        out.entry("User-Agent".into())
            .or_insert_with(|| "chatrelay/0.1".into());
        if let Some(extra) = extra {
            for (k, v) in extra.iter() {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }

    fn body(&self, _model_name: &str, messages: &[ChatMessage], params: &GenerationParams) -> Value {
        // The contents list only knows "user" and "model" roles.
        let mut contents: Vec<GeminiContent> = Vec::new();
        for msg in messages {
            if msg.role == Role::System {
                continue;
            }
            let role = match msg.role {
                Role::Assistant => "model",
                _ => "user",
            };
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart {
                    text: msg.text.clone(),
                }],
            });
        }

        let system_instruction = params
            .system_prompt
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|sp| GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: sp.to_string(),
                }],
            });

        let tools = params.search_enabled.then(|| {
            vec![GeminiTool {
                google_search: GeminiGoogleSearch {},
            }]
        });

        let body = GeminiChatRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_output_tokens: params.max_tokens,
            },
            tools,
        };

        serde_json::to_value(body).unwrap_or_else(|_| json!({}))
    }
}
