use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::Settings;
use crate::error::{ChatError, ChatResult, ProviderError};
use crate::estimator::TokenEstimator;
use crate::types::{ChatMessage, GenerationParams, UsageSummary};

mod anthropic;
mod google_gemini;
mod openai;
pub mod sse;
pub mod transport;

/// Request shaping per backend family. The transport layer is shared; an
/// adapter only knows how to build the URL, headers and JSON body for its
/// vendor, and which role keyword carries the system prompt. Adapters ignore
/// generation parameters their vendor does not support.
pub trait ProviderAdapter: Send + Sync {
    fn default_base_url(&self) -> &'static str;

    fn endpoint(&self, base_url: &str) -> String;

    /// Complete URL including model name and query parameters where the
    /// vendor wants them there (Gemini); defaults to `endpoint`.
    fn build_url(&self, base_url: &str, _model_name: &str, _api_key: &str) -> String {
        self.endpoint(base_url)
    }

    fn system_role(&self) -> &'static str {
        "system"
    }

    /// Default headers for this vendor; `extra` headers from the credential
    /// are merged on top and win on key collision.
    fn headers(
        &self,
        api_key: &str,
        extra: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String>;

    fn body(
        &self,
        model_name: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Value;
}

/// Closed adapter set, selected by the credential's provider id. Unknown ids
/// fall back to the OpenAI-compatible wire shape, which is what most
/// aftermarket vendors speak.
pub fn adapter_for(provider_id: &str) -> Box<dyn ProviderAdapter> {
    match provider_id {
        "anthropic" => Box::new(anthropic::AnthropicAdapter),
        "google" | "gemini" | "google-gemini" => Box::new(google_gemini::GoogleGeminiAdapter),
        _ => Box::new(openai::OpenAiAdapter),
    }
}

/// One normalized event of a provider stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Delta(String),
    Usage(UsageSummary),
    Done,
    Error(ProviderError),
    Aborted,
}

/// Lazy, single-pass, non-restartable sequence of stream events. Finite:
/// terminates with `Done`, `Error` (carrying whatever partial text the
/// consumer accumulated so far) or `Aborted`.
pub struct DeltaStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl DeltaStream {
    pub(crate) fn channel(capacity: usize) -> (mpsc::Sender<StreamEvent>, DeltaStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, DeltaStream { rx })
    }

    /// Pre-buffered stream, used by scripted test providers.
    pub fn from_events(events: Vec<StreamEvent>) -> DeltaStream {
        let (tx, stream) = Self::channel(events.len().max(1));
        for event in events {
            // Capacity covers all events, so try_send cannot fail here.
            let _ = tx.try_send(event);
        }
        stream
    }

    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

/// The orchestrator's seam to the outside world: start a streaming
/// completion, or count tokens locally when the provider reports no usage.
pub trait ChatProvider: Send + Sync {
    fn estimate_tokens(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> ChatResult<u64>;

    fn stream(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
        abort: oneshot::Receiver<()>,
    ) -> impl std::future::Future<Output = ChatResult<DeltaStream>> + Send;
}

/// Production provider: routes a model id to a credential, shapes the
/// request through the vendor adapter and drives the HTTPS stream.
pub struct HttpProvider {
    client: reqwest::Client,
    settings: Arc<Settings>,
    estimator: TokenEstimator,
}

impl HttpProvider {
    pub fn new(settings: Arc<Settings>) -> ChatResult<Self> {
        let client = transport::build_client(settings.connect_timeout_ms)?;
        let tokenizer_path: Option<PathBuf> = settings.tokenizer_path.clone();
        Ok(Self {
            client,
            settings,
            estimator: TokenEstimator::new(tokenizer_path),
        })
    }
}

impl ChatProvider for HttpProvider {
    fn estimate_tokens(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> ChatResult<u64> {
        self.estimator.count_messages(messages, system_prompt)
    }

    async fn stream(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
        abort: oneshot::Receiver<()>,
    ) -> ChatResult<DeltaStream> {
        let route = self.settings.route(model_id).ok_or_else(|| {
            ChatError::InvalidConfig(format!("no provider route for model {}", model_id))
        })?;
        let cred = self.settings.credential(&route.credential_id).ok_or_else(|| {
            ChatError::InvalidConfig(format!("unknown credential {}", route.credential_id))
        })?;
        let adapter = adapter_for(&cred.provider_id);

        let api_key = cred.api_key.as_deref().unwrap_or("");
        let base_url = cred
            .base_url
            .as_deref()
            .unwrap_or_else(|| adapter.default_base_url());
        let url = adapter.build_url(base_url, &route.provider_model, api_key);
        let headers = adapter.headers(api_key, cred.headers.as_ref());
        let body = adapter.body(&route.provider_model, messages, params);

        debug!(model_id, provider = %cred.provider_id, "sending streaming completion request");
        let response = transport::send_streaming(&self.client, &url, headers, &body).await?;
        Ok(transport::spawn_driver(
            response,
            abort,
            self.settings.delta_timeout_ms,
        ))
    }
}
