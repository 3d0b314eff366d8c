use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ChatError, ChatResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredential {
    pub id: String,
    /// Adapter kind key: "openai", "anthropic", "google", or any
    /// OpenAI-compatible vendor id.
    pub provider_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

/// Routes a public model id to a vendor model name plus credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRoute {
    pub model_id: String,
    pub provider_model: String,
    pub credential_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySettings {
    /// Frames buffered toward a slow client before the generation is cancelled.
    #[serde(default = "default_relay_capacity")]
    pub capacity: usize,
    #[serde(default = "default_relay_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_relay_capacity() -> usize {
    256
}

fn default_relay_send_timeout_ms() -> u64 {
    10_000
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            capacity: default_relay_capacity(),
            send_timeout_ms: default_relay_send_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub db_path: PathBuf,
    /// Optional `tokenizer.json` for local token estimation; without it the
    /// estimator falls back to a byte heuristic.
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per-delta read timeout; tripping it mid-stream is a stream error
    /// carrying partial text.
    #[serde(default = "default_delta_timeout_ms")]
    pub delta_timeout_ms: u64,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub credentials: Vec<ProviderCredential>,
    #[serde(default)]
    pub models: Vec<ModelRoute>,
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_delta_timeout_ms() -> u64 {
    60_000
}

impl Settings {
    pub fn load(path: &Path) -> ChatResult<Settings> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ChatError::InvalidConfig(format!("reading {}: {}", path.display(), e)))?;
        let settings: Settings = serde_json::from_str(&raw)
            .map_err(|e| ChatError::InvalidConfig(format!("parsing {}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ChatResult<()> {
        for cred in &self.credentials {
            if let Some(base) = &cred.base_url {
                Url::parse(base).map_err(|e| {
                    ChatError::InvalidConfig(format!(
                        "credential {}: bad base url {:?}: {}",
                        cred.id, base, e
                    ))
                })?;
            }
        }
        for route in &self.models {
            if self.credential(&route.credential_id).is_none() {
                return Err(ChatError::InvalidConfig(format!(
                    "model {} routes to unknown credential {}",
                    route.model_id, route.credential_id
                )));
            }
        }
        Ok(())
    }

    pub fn credential(&self, id: &str) -> Option<&ProviderCredential> {
        self.credentials.iter().find(|c| c.id == id)
    }

    pub fn route(&self, model_id: &str) -> Option<&ModelRoute> {
        self.models.iter().find(|m| m.model_id == model_id)
    }
}
