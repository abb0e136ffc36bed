use crate::adapter::{CompletionRequest, ProviderAdapter, StreamItem, TokenStream};
use crate::error::ProviderError;
use crate::selector::ProviderSelector;
use crate::stream::ChatEvent;
use serde::Serialize;
use stackchat_core::{
    latest_user_message, CredentialResolver, Message, StackConfig, StackchatError, ToolCall,
    ToolResult, CONTENT_SEARCH_TOOL,
};
use stackchat_retrieval::{RetrievalOutcome, RetrievedContext, Retriever};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One chat turn as received from a client.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Conversation as sent by the client.
    pub messages: Vec<Message>,
    /// Requested provider name.
    pub provider: Option<String>,
    /// Requested model name.
    pub model: Option<String>,
    /// Credentials from the request body.
    pub credentials: Option<StackConfig>,
    /// Credentials from the `x-stack-config` header.
    pub header_credentials: Option<StackConfig>,
}

/// A complete non-streamed reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// Provider that produced the reply.
    pub provider: String,
    /// Reply text.
    pub reply: String,
}

/// Why a turn failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request could not be served with the available credentials.
    Credentials,
    /// A provider failed and no fallback applied.
    Provider,
}

/// A failed turn, shaped like the `error` event payload.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{error}")]
pub struct ChatFailure {
    /// Failure category, not serialized.
    #[serde(skip)]
    pub kind: FailureKind,
    /// Error description.
    pub error: String,
    /// Provider that failed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ChatFailure {
    fn credentials(err: StackchatError) -> Self {
        let error = match err {
            StackchatError::Credentials(msg) => msg,
            other => other.to_string(),
        };
        Self {
            kind: FailureKind::Credentials,
            error,
            provider: None,
        }
    }

    fn provider(err: &ProviderError, adapter: &ProviderAdapter) -> Self {
        Self {
            kind: FailureKind::Provider,
            error: err.to_string(),
            provider: Some(adapter.kind().to_string()),
        }
    }

    fn into_event(self) -> ChatEvent {
        ChatEvent::error(self.error, self.provider)
    }
}

/// Allows at most one provider switch per turn.
#[derive(Debug, Default)]
struct FallbackGuard {
    used: bool,
}

impl FallbackGuard {
    /// Picks the fallback for a failed adapter and consumes the guard.
    ///
    /// Applies only to quota and rate-limit failures of an adapter that has
    /// a partner, and only once.
    fn take<'a>(
        &mut self,
        selector: &'a ProviderSelector,
        failed: &ProviderAdapter,
        err: &ProviderError,
    ) -> Option<&'a ProviderAdapter> {
        if self.used || !err.is_quota_or_rate_limit() {
            return None;
        }
        let fallback = selector.resolve_fallback(failed.kind())?;
        self.used = true;
        Some(fallback)
    }
}

/// Writes events to the client and enforces a single terminal event.
struct EventSink {
    tx: mpsc::Sender<ChatEvent>,
    terminated: bool,
}

impl EventSink {
    fn new(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self { tx, terminated: false }
    }

    /// Returns `false` once the client is gone or the turn has ended.
    async fn emit(&mut self, event: ChatEvent) -> bool {
        if self.terminated {
            return false;
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        self.tx.send(event).await.is_ok()
    }

    /// Resolves when the client drops its end of the channel.
    async fn closed(&self) {
        self.tx.closed().await;
    }
}

enum Drained {
    Finished,
    Disconnected,
    Failed(ProviderError),
}

/// Runs chat turns: retrieval, augmentation, provider streaming and fallback.
pub struct ChatOrchestrator {
    retriever: Arc<Retriever>,
    selector: Arc<ProviderSelector>,
    credentials: CredentialResolver,
}

impl ChatOrchestrator {
    /// Assembles an orchestrator.
    pub fn new(retriever: Arc<Retriever>, selector: Arc<ProviderSelector>, credentials: CredentialResolver) -> Self {
        Self {
            retriever,
            selector,
            credentials,
        }
    }

    /// Provider selector.
    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    /// Content retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Credential resolver.
    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    /// Streams one turn into `events`.
    ///
    /// The channel receives at most one `tool_call`, then tokens (with at most
    /// one `provider_switch`), and always exactly one terminal event unless
    /// the receiver is dropped first.
    pub async fn run(&self, request: ChatRequest, events: mpsc::Sender<ChatEvent>) {
        let mut sink = EventSink::new(events);

        let (messages, tool_content) = match self.prepare(&request).await {
            Ok(prepared) => prepared,
            Err(failure) => {
                sink.emit(failure.into_event()).await;
                return;
            }
        };
        if let Some(content) = tool_content {
            if !sink.emit(ChatEvent::ToolCall { content }).await {
                return;
            }
        }

        let mut adapter = self.selector.resolve(request.provider.as_deref());
        let mut guard = FallbackGuard::default();

        loop {
            let model = self.selector.map_model(request.model.as_deref(), adapter.kind());
            info!(provider = %adapter.kind(), %model, "Streaming completion");
            let stream = adapter.stream(CompletionRequest::new(model, messages.clone()));

            match drain(stream, &mut sink).await {
                Drained::Finished => {
                    sink.emit(ChatEvent::Done {}).await;
                    return;
                }
                Drained::Disconnected => {
                    info!(provider = %adapter.kind(), "Client disconnected, stopping turn");
                    return;
                }
                Drained::Failed(err) => match guard.take(&self.selector, adapter, &err) {
                    Some(fallback) => {
                        warn!(from = %adapter.kind(), to = %fallback.kind(), error = %err, "Switching provider");
                        let switch = ChatEvent::ProviderSwitch {
                            from: adapter.kind().to_string(),
                            to: fallback.kind().to_string(),
                            reason: err.to_string(),
                        };
                        if !sink.emit(switch).await {
                            return;
                        }
                        adapter = fallback;
                    }
                    None => {
                        warn!(provider = %adapter.kind(), error = %err, "Turn failed");
                        sink.emit(ChatFailure::provider(&err, adapter).into_event()).await;
                        return;
                    }
                },
            }
        }
    }

    /// Produces a complete reply without streaming.
    pub async fn reply(&self, request: ChatRequest) -> Result<Reply, ChatFailure> {
        let (messages, _) = self.prepare(&request).await?;
        let mut adapter = self.selector.resolve(request.provider.as_deref());
        let mut guard = FallbackGuard::default();

        loop {
            let model = self.selector.map_model(request.model.as_deref(), adapter.kind());
            info!(provider = %adapter.kind(), %model, "Requesting completion");
            match adapter.complete(&CompletionRequest::new(model, messages.clone())).await {
                Ok(message) => {
                    return Ok(Reply {
                        provider: adapter.kind().to_string(),
                        reply: message.text().to_string(),
                    })
                }
                Err(err) => match guard.take(&self.selector, adapter, &err) {
                    Some(fallback) => {
                        warn!(from = %adapter.kind(), to = %fallback.kind(), error = %err, "Switching provider");
                        adapter = fallback;
                    }
                    None => return Err(ChatFailure::provider(&err, adapter)),
                },
            }
        }
    }

    /// Resolves credentials, retrieves content and augments the conversation.
    ///
    /// Returns the messages to send and the tool content to announce.
    async fn prepare(&self, request: &ChatRequest) -> Result<(Vec<Message>, Option<String>), ChatFailure> {
        let credentials = self.resolve_credentials(request).map_err(ChatFailure::credentials)?;
        let user_message = latest_user_message(&request.messages).unwrap_or_default();

        let outcome = self
            .retriever
            .classify_and_fetch(user_message, credentials.as_ref())
            .await
            .map_err(ChatFailure::credentials)?;

        let mut messages = request.messages.clone();
        match outcome {
            RetrievalOutcome::Greeting(_) => {
                debug!("No content needed for this turn");
                Ok((messages, None))
            }
            RetrievalOutcome::Context(ctx) => {
                let result = augment(&mut messages, user_message, &ctx);
                Ok((messages, Some(result.content)))
            }
        }
    }

    /// `None` when no source supplies credentials at all, so that messages
    /// needing no content can still be answered.
    fn resolve_credentials(&self, request: &ChatRequest) -> Result<Option<StackConfig>, StackchatError> {
        if request.credentials.is_none() && request.header_credentials.is_none() && !self.credentials.has_default() {
            return Ok(None);
        }
        let (config, source) = self
            .credentials
            .resolve(request.credentials.as_ref(), request.header_credentials.as_ref())?;
        debug!(?source, "Resolved Contentstack credentials");
        Ok(Some(config))
    }
}

/// Appends the synthetic search call and its result to the conversation.
fn augment(messages: &mut Vec<Message>, user_message: &str, ctx: &RetrievedContext) -> ToolResult {
    let call = ToolCall::new(
        format!("call_{}", uuid::Uuid::new_v4().simple()),
        CONTENT_SEARCH_TOOL,
        &serde_json::json!({
            "query": user_message,
            "content_type": ctx.content_type,
            "filters": ctx.filters,
        }),
    );
    let result = if ctx.is_error {
        ToolResult::error(&call.id, &ctx.content)
    } else {
        ToolResult::success(&call.id, &ctx.content)
    };
    messages.push(Message::assistant_tool_calls(vec![call]));
    messages.push(Message::tool(&result));
    result
}

async fn drain(mut stream: TokenStream, sink: &mut EventSink) -> Drained {
    loop {
        let next = tokio::select! {
            item = stream.next() => Some(item),
            () = sink.closed() => None,
        };
        let Some(item) = next else {
            return Drained::Disconnected;
        };
        match item {
            Some(StreamItem::Token(token)) => {
                if !sink.emit(ChatEvent::Token { token }).await {
                    return Drained::Disconnected;
                }
            }
            Some(StreamItem::Done) | None => return Drained::Finished,
            Some(StreamItem::Failed(err)) => return Drained::Failed(err),
        }
    }
}
