use crate::backends::LlmBackend;
use crate::config::ProviderKind;
use crate::error::ProviderError;
use stackchat_core::Message;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const TOKEN_BUFFER: usize = 256;

/// A model call: the vendor-native model name plus the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Vendor-native model name.
    pub model: String,
    /// Conversation, augmentation included.
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    /// Pairs a model name with a conversation.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// One item of a [`TokenStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A text fragment.
    Token(String),
    /// The vendor finished normally.
    Done,
    /// The vendor call failed.
    Failed(ProviderError),
}

impl StreamItem {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamItem::Token(_))
    }
}

/// Tokens of one streamed completion.
///
/// Yields `Token`s in arrival order followed by exactly one `Done` or
/// `Failed`, then `None`. Dropping the stream aborts the vendor call.
pub struct TokenStream {
    provider: ProviderKind,
    rx: mpsc::Receiver<StreamItem>,
    handle: JoinHandle<()>,
    finished: bool,
}

impl TokenStream {
    /// Vendor producing this stream.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Next item, or `None` after the terminal item.
    pub async fn next(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }
        let item = match self.rx.recv().await {
            Some(item) => item,
            // The producer task died without a terminal item.
            None => StreamItem::Failed(ProviderError::new(
                self.provider,
                format!("{} stream ended unexpectedly", self.provider),
            )),
        };
        if item.is_terminal() {
            self.finished = true;
        }
        Some(item)
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A vendor backend tagged with the provider it speaks for.
#[derive(Clone)]
pub struct ProviderAdapter {
    kind: ProviderKind,
    backend: Arc<dyn LlmBackend>,
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter").field("kind", &self.kind).finish()
    }
}

impl ProviderAdapter {
    /// Wraps `backend` under `kind`.
    pub fn new(kind: ProviderKind, backend: Arc<dyn LlmBackend>) -> Self {
        Self { kind, backend }
    }

    /// Vendor identity of this adapter.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Requests a whole reply without streaming.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Message, ProviderError> {
        self.backend.complete(&request.model, &request.messages).await
    }

    /// Starts a streamed completion on a background task.
    ///
    /// A stream that completes without a single token is re-issued without
    /// streaming and its text delivered as one token.
    pub fn stream(&self, request: CompletionRequest) -> TokenStream {
        let (tx, rx) = mpsc::channel::<StreamItem>(TOKEN_BUFFER);
        let backend = self.backend.clone();
        let kind = self.kind;

        let handle = tokio::spawn(async move {
            let (token_tx, mut token_rx) = mpsc::channel::<String>(TOKEN_BUFFER);
            let forward_tx = tx.clone();
            let forward = async move {
                let mut emitted = 0usize;
                while let Some(token) = token_rx.recv().await {
                    emitted += 1;
                    if forward_tx.send(StreamItem::Token(token)).await.is_err() {
                        break;
                    }
                }
                emitted
            };
            let produce = backend.stream(&request.model, &request.messages, token_tx);
            let (result, emitted) = tokio::join!(produce, forward);

            let terminal = match result {
                Ok(()) if emitted == 0 => {
                    debug!(provider = %kind, "Stream produced no tokens, retrying without streaming");
                    match backend.complete(&request.model, &request.messages).await {
                        Ok(message) => {
                            let text = message.text();
                            if !text.is_empty() && tx.send(StreamItem::Token(text.to_string())).await.is_err() {
                                return;
                            }
                            StreamItem::Done
                        }
                        Err(e) => StreamItem::Failed(e),
                    }
                }
                Ok(()) => StreamItem::Done,
                Err(e) => {
                    warn!(provider = %kind, error = %e, "Provider stream failed");
                    StreamItem::Failed(e)
                }
            };
            let _ = tx.send(terminal).await;
        });

        TokenStream {
            provider: kind,
            rx,
            handle,
            finished: false,
        }
    }
}
