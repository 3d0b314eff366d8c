use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::abort::AbortRegistry;
use crate::accountant::compute_cost;
use crate::error::{ChatError, ChatResult};
use crate::provider::{ChatProvider, DeltaStream, StreamEvent};
use crate::relay::{RelayFrame, RelaySender};
use crate::store::Store;
use crate::types::{
    ChatMessage, Cost, GenerationRequest, Message, MessageStatus, Role, TokenUsage, UsageSummary,
};

/// How often a generation is retried against the provider. Retrying is only
/// safe while nothing has been relayed to the client yet.
const MAX_STREAM_ATTEMPTS: u32 = 2;

/// One extra attempt for the balance debit; the debit is idempotent per
/// assistant message id, so replaying it is harmless.
const DEBIT_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Stream ran to completion (or was stopped by the user); the partial or
    /// full reply is persisted and billed.
    Committed,
    /// Stream failed mid-flight; whatever text arrived is persisted and
    /// billed, and the client got an error frame after the deltas.
    FailedCommitted,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub status: OutcomeStatus,
    pub user_message_id: String,
    pub assistant_message_id: String,
    pub usage: TokenUsage,
    pub cost: Cost,
}

/// Drives one generation end to end: admission checks, context assembly,
/// provider streaming, finalize and billing. Every path that appended rows
/// either commits them or removes the pending assistant row again, so the
/// tree never retains half-finished state across requests.
pub struct Orchestrator<P: ChatProvider> {
    store: Store,
    provider: Arc<P>,
    aborts: AbortRegistry,
}

impl<P: ChatProvider> Orchestrator<P> {
    pub fn new(store: Store, provider: Arc<P>) -> Self {
        Self {
            store,
            provider,
            aborts: AbortRegistry::new(),
        }
    }

    /// Request a running generation to stop. Keyed by the pending assistant
    /// message id, which the caller learned from its own append echo.
    pub fn stop(&self, assistant_message_id: &str) -> ChatResult<()> {
        self.aborts.abort(assistant_message_id)
    }

    pub async fn run(
        &self,
        request: GenerationRequest,
        relay: RelaySender,
    ) -> ChatResult<GenerationOutcome> {
        // Admission. Nothing is written until every check passes.
        let messages = self.store.messages();
        let chat = messages.get_chat(&request.chat_id)?;
        if chat.user_id != request.user_id {
            return Err(ChatError::Unauthorized(format!(
                "chat {} does not belong to this user",
                request.chat_id
            )));
        }

        let catalog = self.store.catalog();
        let binding = catalog
            .user_model(&request.user_id, &request.model_id)?
            .filter(|b| b.enabled)
            .ok_or_else(|| {
                ChatError::Unauthorized(format!(
                    "model {} is not enabled for this user",
                    request.model_id
                ))
            })?;
        if let Some(min) = binding.temperature_min {
            if request.params.temperature < min {
                return Err(ChatError::BadRequest(format!(
                    "temperature {} is below the allowed minimum {}",
                    request.params.temperature, min
                )));
            }
        }
        if let Some(max) = binding.temperature_max {
            if request.params.temperature > max {
                return Err(ChatError::BadRequest(format!(
                    "temperature {} is above the allowed maximum {}",
                    request.params.temperature, max
                )));
            }
        }
        if let Some(cap) = binding.max_tokens {
            if request.params.max_tokens > cap {
                return Err(ChatError::BadRequest(format!(
                    "maxTokens {} exceeds the allowed limit {}",
                    request.params.max_tokens, cap
                )));
            }
        }

        let ledger = self.store.ledger();
        if !ledger.check_sufficient(&request.user_id)? {
            return Err(ChatError::InsufficientBalance);
        }

        // Price snapshot taken at admission; later catalog edits do not
        // change what this generation is billed at.
        let price = catalog.price(&request.model_id)?;

        // Context assembly: ancestor path up to the attachment point, then
        // the new user message and a pending assistant child.
        let path = messages.get_ancestor_path(
            &request.chat_id,
            request.parent_message_id.as_deref(),
        )?;

        let now = Utc::now().timestamp_millis();
        let user_message_id = request
            .user_message_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let user_message = Message {
            id: user_message_id.clone(),
            chat_id: request.chat_id.clone(),
            parent_id: request.parent_message_id.clone(),
            role: Role::User,
            text: request.user_text.clone(),
            attachments: request.attachment_ids.clone(),
            status: MessageStatus::Final,
            token_usage: None,
            cost: None,
            model_id: None,
            created_at: now,
        };
        messages.append_message(&user_message)?;

        let assistant_message_id = Uuid::new_v4().to_string();
        let assistant_message = Message {
            id: assistant_message_id.clone(),
            chat_id: request.chat_id.clone(),
            parent_id: Some(user_message_id.clone()),
            role: Role::Assistant,
            text: String::new(),
            attachments: Vec::new(),
            status: MessageStatus::Pending,
            token_usage: None,
            cost: None,
            model_id: Some(request.model_id.clone()),
            created_at: now,
        };
        messages.append_message(&assistant_message)?;

        let mut context: Vec<ChatMessage> = path
            .iter()
            .map(|m| ChatMessage {
                role: m.role,
                text: m.text.clone(),
                attachments: m.attachments.clone(),
            })
            .collect();
        context.push(ChatMessage {
            role: Role::User,
            text: request.user_text.clone(),
            attachments: request.attachment_ids.clone(),
        });

        // Streaming. A transient failure before anything reached the client
        // gets one silent retry; after the first relayed frame the stream is
        // committed as-is.
        let mut buffer = String::new();
        let mut reported = UsageSummary::default();
        let mut stream_error: Option<ChatError> = None;
        let mut stopped = false;
        let mut frames_relayed: u64 = 0;

        let mut attempt = 0;
        'attempts: while attempt < MAX_STREAM_ATTEMPTS {
            attempt += 1;
            let abort_rx = self.aborts.register(&assistant_message_id);
            let stream = match self
                .provider
                .stream(&request.model_id, &context, &request.params, abort_rx)
                .await
            {
                Ok(stream) => stream,
                Err(err) => {
                    if attempt < MAX_STREAM_ATTEMPTS && frames_relayed == 0 && is_transient(&err) {
                        debug!(attempt, "stream start failed, retrying");
                        continue 'attempts;
                    }
                    self.aborts.unregister(&assistant_message_id);
                    messages.discard_pending(&assistant_message_id)?;
                    let _ = relay.send(RelayFrame::error(err.to_string())).await;
                    return Err(err);
                }
            };

            match self
                .consume(stream, &relay, &mut buffer, &mut reported, &mut frames_relayed)
                .await
            {
                Consumed::Finished => break 'attempts,
                Consumed::Stopped => {
                    stopped = true;
                    break 'attempts;
                }
                Consumed::Failed(err) => {
                    if attempt < MAX_STREAM_ATTEMPTS && frames_relayed == 0 && is_transient(&err) {
                        debug!(attempt, "stream failed before first frame, retrying");
                        continue 'attempts;
                    }
                    stream_error = Some(err);
                    break 'attempts;
                }
            }
        }
        self.aborts.unregister(&assistant_message_id);

        // Finalizing. Provider-reported usage wins; otherwise the local
        // estimator covers both directions.
        let usage = match reported.as_token_usage() {
            Some(usage) => usage,
            None => self.estimate_usage(&context, &request.params, &buffer)?,
        };
        let cost = compute_cost(&price, usage.input_tokens, usage.output_tokens)?;

        messages.finalize_message(&assistant_message_id, &buffer, usage, cost)?;
        self.debit_with_retry(&request.user_id, cost, &assistant_message_id)?;
        messages.touch_chat(
            &request.chat_id,
            &request.model_id,
            Some(&request.user_text),
        )?;

        let status = match &stream_error {
            None => OutcomeStatus::Committed,
            Some(_) => OutcomeStatus::FailedCommitted,
        };
        let terminal = match stream_error {
            None => RelayFrame::committed(),
            Some(err) => RelayFrame::error(err.to_string()),
        };
        // The row is committed either way; a consumer that vanished before
        // the terminal frame does not undo that.
        if let Err(err) = relay.send(terminal).await {
            debug!(error = %err, "terminal frame not delivered");
        }

        debug!(
            chat_id = %request.chat_id,
            assistant_message_id = %assistant_message_id,
            stopped,
            ?status,
            "generation finished"
        );
        Ok(GenerationOutcome {
            status,
            user_message_id,
            assistant_message_id,
            usage,
            cost,
        })
    }

    async fn consume(
        &self,
        mut stream: DeltaStream,
        relay: &RelaySender,
        buffer: &mut String,
        reported: &mut UsageSummary,
        frames_relayed: &mut u64,
    ) -> Consumed {
        loop {
            match stream.next().await {
                Some(StreamEvent::Delta(text)) => {
                    buffer.push_str(&text);
                    if let Err(err) = relay.send(RelayFrame::delta(text)).await {
                        // Consumer gone or stalled; wind down like a stop
                        // and keep what already arrived.
                        warn!(error = %err, "relay lost mid-stream, stopping generation");
                        return Consumed::Stopped;
                    }
                    *frames_relayed += 1;
                }
                Some(StreamEvent::Usage(usage)) => {
                    // Later reports refine earlier ones field by field.
                    if usage.prompt_tokens.is_some() {
                        reported.prompt_tokens = usage.prompt_tokens;
                    }
                    if usage.completion_tokens.is_some() {
                        reported.completion_tokens = usage.completion_tokens;
                    }
                    if usage.total_tokens.is_some() {
                        reported.total_tokens = usage.total_tokens;
                    }
                }
                Some(StreamEvent::Error(err)) => return Consumed::Failed(err.into()),
                Some(StreamEvent::Aborted) => return Consumed::Stopped,
                Some(StreamEvent::Done) | None => return Consumed::Finished,
            }
        }
    }

    fn estimate_usage(
        &self,
        context: &[ChatMessage],
        params: &crate::types::GenerationParams,
        output: &str,
    ) -> ChatResult<TokenUsage> {
        let input_tokens = self
            .provider
            .estimate_tokens(context, params.system_prompt.as_deref())?;
        let output_tokens = if output.is_empty() {
            0
        } else {
            self.provider
                .estimate_tokens(&[ChatMessage::text(Role::Assistant, output)], None)?
        };
        Ok(TokenUsage {
            input_tokens,
            output_tokens,
        })
    }

    fn debit_with_retry(&self, user_id: &str, cost: Cost, message_id: &str) -> ChatResult<()> {
        let ledger = self.store.ledger();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match ledger.debit(user_id, cost.total(), message_id) {
                Ok(()) => return Ok(()),
                Err(ChatError::Storage(msg)) if attempt < DEBIT_ATTEMPTS => {
                    warn!(message_id, error = %msg, "debit failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

enum Consumed {
    Finished,
    Stopped,
    Failed(ChatError),
}

fn is_transient(err: &ChatError) -> bool {
    match err {
        ChatError::Provider(p) => p.is_transient(),
        ChatError::Storage(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::{mpsc, oneshot};

    use crate::config::RelaySettings;
    use crate::error::ProviderError;
    use crate::money::Money;
    use crate::store::test_util::temp_store;
    use crate::store::PriceConfig;
    use crate::types::{GenerationParams, UserModel};

    /// Replays pre-scripted event sequences, one per stream() call. An empty
    /// script queue simulates a provider that rejects the request outright.
    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Vec<StreamEvent>>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Vec<StreamEvent>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into_iter().collect()),
            })
        }
    }

    impl ChatProvider for ScriptedProvider {
        fn estimate_tokens(
            &self,
            messages: &[ChatMessage],
            system_prompt: Option<&str>,
        ) -> ChatResult<u64> {
            let mut total: u64 = system_prompt
                .map(|p| p.split_whitespace().count() as u64)
                .unwrap_or(0);
            for m in messages {
                total += m.text.split_whitespace().count() as u64;
            }
            Ok(total.max(1))
        }

        async fn stream(
            &self,
            _model_id: &str,
            _messages: &[ChatMessage],
            _params: &GenerationParams,
            _abort: oneshot::Receiver<()>,
        ) -> ChatResult<DeltaStream> {
            let script = self.scripts.lock().unwrap().pop_front().ok_or_else(|| {
                ChatError::Provider(ProviderError::permanent("no capacity"))
            })?;
            Ok(DeltaStream::from_events(script))
        }
    }

    struct Fixture {
        store: Store,
        chat_id: String,
    }

    const USER: &str = "user-1";
    const MODEL: &str = "gpt-4o-mini";

    fn fixture() -> Fixture {
        let store = temp_store();
        let chat = store
            .messages()
            .create_chat(USER, Some(MODEL))
            .unwrap();
        store
            .catalog()
            .upsert_user_model(&UserModel {
                user_id: USER.into(),
                model_id: MODEL.into(),
                enabled: true,
                max_tokens: Some(4096),
                temperature_min: Some(0.0),
                temperature_max: Some(1.0),
            })
            .unwrap();
        store
            .catalog()
            .upsert_price(
                MODEL,
                PriceConfig {
                    input_per_million: Money::parse("2.00").unwrap(),
                    output_per_million: Money::parse("6.00").unwrap(),
                },
            )
            .unwrap();
        store
            .ledger()
            .set_balance(USER, Money::parse("10.00").unwrap())
            .unwrap();
        Fixture {
            store,
            chat_id: chat.id,
        }
    }

    fn request(chat_id: &str) -> GenerationRequest {
        GenerationRequest {
            user_id: USER.into(),
            chat_id: chat_id.into(),
            model_id: MODEL.into(),
            parent_message_id: None,
            user_text: "What is the capital of France?".into(),
            attachment_ids: Vec::new(),
            user_message_id: None,
            params: GenerationParams::default(),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<RelayFrame>) -> Vec<RelayFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn relay_pair() -> (RelaySender, mpsc::Receiver<RelayFrame>) {
        RelaySender::channel(&RelaySettings::default())
    }

    #[tokio::test]
    async fn successful_stream_commits_and_debits() {
        let fx = fixture();
        let provider = ScriptedProvider::new(vec![vec![
            StreamEvent::Delta("Paris".into()),
            StreamEvent::Delta(" it is.".into()),
            StreamEvent::Usage(UsageSummary {
                prompt_tokens: Some(500),
                completion_tokens: Some(300),
                total_tokens: Some(800),
            }),
            StreamEvent::Done,
        ]]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, mut rx) = relay_pair();

        let outcome = orch.run(request(&fx.chat_id), relay).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Committed);
        assert_eq!(
            outcome.usage,
            TokenUsage {
                input_tokens: 500,
                output_tokens: 300
            }
        );
        assert_eq!(outcome.cost.total().to_string(), "0.0028");

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 3);
        assert!(frames[..2].iter().all(|f| f.success && !f.is_terminal()));
        assert!(frames[2].success && frames[2].is_terminal());

        let saved = fx
            .store
            .messages()
            .get_message(&outcome.assistant_message_id)
            .unwrap();
        assert_eq!(saved.text, "Paris it is.");
        assert_eq!(saved.status, MessageStatus::Final);
        assert_eq!(
            fx.store.ledger().balance(USER).unwrap().to_string(),
            "9.9972"
        );
    }

    #[tokio::test]
    async fn disabled_model_rejected_before_any_write() {
        let fx = fixture();
        fx.store
            .catalog()
            .upsert_user_model(&UserModel {
                user_id: USER.into(),
                model_id: MODEL.into(),
                enabled: false,
                max_tokens: None,
                temperature_min: None,
                temperature_max: None,
            })
            .unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, mut rx) = relay_pair();

        let err = orch.run(request(&fx.chat_id), relay).await.unwrap_err();
        assert!(matches!(err, ChatError::Unauthorized(_)));
        assert!(drain(&mut rx).is_empty());
        // No branches were appended under the root.
        let roots = fx
            .store
            .messages()
            .list_siblings(&fx.chat_id, None)
            .unwrap();
        assert!(roots.is_empty());
        assert_eq!(
            fx.store.ledger().balance(USER).unwrap().to_string(),
            "10.00"
        );
    }

    #[tokio::test]
    async fn temperature_out_of_bounds_is_bad_request() {
        let fx = fixture();
        let provider = ScriptedProvider::new(vec![]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, _rx) = relay_pair();

        let mut req = request(&fx.chat_id);
        req.params.temperature = 1.5;
        let err = orch.run(req, relay).await.unwrap_err();
        match err {
            ChatError::BadRequest(msg) => assert!(msg.contains("temperature")),
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_balance_is_rejected() {
        let fx = fixture();
        fx.store.ledger().set_balance(USER, Money::ZERO).unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, _rx) = relay_pair();

        let err = orch.run(request(&fx.chat_id), relay).await.unwrap_err();
        assert!(matches!(err, ChatError::InsufficientBalance));
    }

    #[tokio::test]
    async fn midstream_failure_commits_partial_text_with_error_frame() {
        let fx = fixture();
        let provider = ScriptedProvider::new(vec![vec![
            StreamEvent::Delta("The capital".into()),
            StreamEvent::Delta(" of France".into()),
            StreamEvent::Delta(" is".into()),
            StreamEvent::Error(ProviderError::transient("upstream reset")),
        ]]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, mut rx) = relay_pair();

        let outcome = orch.run(request(&fx.chat_id), relay).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::FailedCommitted);
        assert!(outcome.usage.input_tokens > 0);
        assert!(outcome.usage.output_tokens > 0);
        assert!(outcome.cost.total() > Money::ZERO);

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 4);
        assert!(!frames[3].success);
        assert!(frames[3].is_terminal());

        let saved = fx
            .store
            .messages()
            .get_message(&outcome.assistant_message_id)
            .unwrap();
        assert_eq!(saved.text, "The capital of France is");
        assert_eq!(saved.status, MessageStatus::Final);
        assert!(fx.store.ledger().balance(USER).unwrap() < Money::parse("10.00").unwrap());
    }

    #[tokio::test]
    async fn transient_failure_before_first_frame_is_retried_once() {
        let fx = fixture();
        let provider = ScriptedProvider::new(vec![
            vec![StreamEvent::Error(ProviderError::transient("rate limited"))],
            vec![
                StreamEvent::Delta("Paris.".into()),
                StreamEvent::Usage(UsageSummary {
                    prompt_tokens: Some(10),
                    completion_tokens: Some(2),
                    total_tokens: Some(12),
                }),
                StreamEvent::Done,
            ],
        ]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, mut rx) = relay_pair();

        let outcome = orch.run(request(&fx.chat_id), relay).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Committed);
        let frames = drain(&mut rx);
        // Only the retried attempt's delta plus the ack, nothing leaked from
        // the failed first attempt.
        assert_eq!(frames.len(), 2);
        let saved = fx
            .store
            .messages()
            .get_message(&outcome.assistant_message_id)
            .unwrap();
        assert_eq!(saved.text, "Paris.");
    }

    #[tokio::test]
    async fn stop_commits_partial_text_with_ack_frame() {
        let fx = fixture();
        let provider = ScriptedProvider::new(vec![vec![
            StreamEvent::Delta("Par".into()),
            StreamEvent::Aborted,
        ]]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, mut rx) = relay_pair();

        let outcome = orch.run(request(&fx.chat_id), relay).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Committed);
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].success && frames[1].is_terminal());

        let saved = fx
            .store
            .messages()
            .get_message(&outcome.assistant_message_id)
            .unwrap();
        assert_eq!(saved.text, "Par");
        assert_eq!(saved.status, MessageStatus::Final);
        // Stopped generations still pay for what arrived.
        assert!(fx.store.ledger().balance(USER).unwrap() < Money::parse("10.00").unwrap());
    }

    #[tokio::test]
    async fn start_failure_discards_pending_assistant_row() {
        let fx = fixture();
        // Empty script queue: stream() fails with a permanent error.
        let provider = ScriptedProvider::new(vec![]);
        let orch = Orchestrator::new(fx.store.clone(), provider);
        let (relay, mut rx) = relay_pair();

        let mut req = request(&fx.chat_id);
        req.user_message_id = Some("user-msg-1".into());
        let err = orch.run(req, relay).await.unwrap_err();
        assert!(matches!(err, ChatError::Provider(_)));

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].success);

        let messages = fx.store.messages();
        // The user message stays; the pending assistant child is gone.
        assert_eq!(messages.get_message("user-msg-1").unwrap().text.is_empty(), false);
        assert!(messages
            .list_siblings(&fx.chat_id, Some("user-msg-1"))
            .unwrap()
            .is_empty());
        assert_eq!(
            fx.store.ledger().balance(USER).unwrap().to_string(),
            "10.00"
        );
    }

    #[tokio::test]
    async fn rerunning_under_same_parent_creates_sibling_branches() {
        let fx = fixture();
        let provider = ScriptedProvider::new(vec![
            vec![StreamEvent::Delta("first".into()), StreamEvent::Done],
            vec![StreamEvent::Delta("second".into()), StreamEvent::Done],
        ]);
        let orch = Orchestrator::new(fx.store.clone(), provider);

        let (relay_a, _rx_a) = relay_pair();
        let first = orch.run(request(&fx.chat_id), relay_a).await.unwrap();
        let (relay_b, _rx_b) = relay_pair();
        let second = orch.run(request(&fx.chat_id), relay_b).await.unwrap();

        let roots = fx
            .store
            .messages()
            .list_siblings(&fx.chat_id, None)
            .unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].id, first.user_message_id);
        assert_eq!(roots[1].id, second.user_message_id);
    }

    #[tokio::test]
    async fn chat_title_set_from_first_message_and_kept() {
        let fx = fixture();
        let provider = ScriptedProvider::new(vec![
            vec![StreamEvent::Delta("a".into()), StreamEvent::Done],
            vec![StreamEvent::Delta("b".into()), StreamEvent::Done],
        ]);
        let orch = Orchestrator::new(fx.store.clone(), provider);

        let (relay_a, _rx_a) = relay_pair();
        orch.run(request(&fx.chat_id), relay_a).await.unwrap();
        let (relay_b, _rx_b) = relay_pair();
        let mut req = request(&fx.chat_id);
        req.user_text = "a different follow-up".into();
        orch.run(req, relay_b).await.unwrap();

        let chat = fx
            .store
            .messages()
            .get_chat(&fx.chat_id)
            .unwrap();
        assert_eq!(chat.title, "What is the capital of France?");
        assert_eq!(chat.current_model_id.as_deref(), Some(MODEL));
    }
}
