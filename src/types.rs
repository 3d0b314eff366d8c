use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created when generation starts; text lives in memory until finalize.
    Pending,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cost {
    pub input_price: Money,
    pub output_price: Money,
}

impl Cost {
    pub const ZERO: Cost = Cost {
        input_price: Money::ZERO,
        output_price: Money::ZERO,
    };

    pub fn total(&self) -> Money {
        self.input_price + self.output_price
    }
}

/// One node of a per-chat message tree. `parent_id` is `None` only for a
/// root; siblings under one parent are alternate branches in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub parent_id: Option<String>,
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub status: MessageStatus,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub cost: Option<Cost>,
    #[serde(default)]
    pub model_id: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub current_model_id: Option<String>,
    /// Snapshot of the user's model config (prompt, temperature, ...).
    #[serde(default)]
    pub config: Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A (user, model) binding with per-user validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModel {
    pub user_id: String,
    pub model_id: String,
    pub enabled: bool,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature_min: Option<f64>,
    #[serde(default)]
    pub temperature_max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub search_enabled: bool,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    1.0
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            search_enabled: false,
        }
    }
}

/// Normalized adapter input: the ancestor path plus the new user message,
/// flattened to role/text/attachments triples.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Final usage record reported by a provider stream, all fields best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl UsageSummary {
    /// Usable for accounting only when both directions were reported.
    pub fn as_token_usage(&self) -> Option<TokenUsage> {
        match (self.prompt_tokens, self.completion_tokens) {
            (Some(input), Some(output)) => Some(TokenUsage {
                input_tokens: input,
                output_tokens: output,
            }),
            _ => None,
        }
    }
}

/// Inbound generation request, handed over by the (external) API layer with
/// an already-validated user identity attached.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub user_id: String,
    pub chat_id: String,
    pub model_id: String,
    /// Edit/regenerate attachment point; `None` starts a new root branch.
    #[serde(default)]
    pub parent_message_id: Option<String>,
    pub user_text: String,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
    /// Client may pre-generate the user message id for optimistic append.
    #[serde(default)]
    pub user_message_id: Option<String>,
    #[serde(default)]
    pub params: GenerationParams,
}
