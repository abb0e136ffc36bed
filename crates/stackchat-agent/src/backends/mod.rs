/// Google Gemini.
pub mod gemini;
/// OpenAI and OpenAI-compatible vendors.
pub mod openai;

use crate::config::ProviderKind;
use crate::error::ProviderError;
use async_trait::async_trait;
use stackchat_core::Message;
use tokio::sync::mpsc;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

/// Trait for LLM vendor backends.
///
/// To add a vendor:
/// 1. Create a module in `backends/`
/// 2. Implement `LlmBackend` for it
/// 3. Add the variant to `ProviderKind` in `config.rs`
/// 4. Build it in `ProviderSelector::from_config`
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming completion. The reply text is in the returned message.
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<Message, ProviderError>;

    /// Streaming completion.
    ///
    /// Pushes each text fragment into `tokens` in arrival order. Returns `Ok`
    /// once the vendor signals completion and `Err` on failure or when the
    /// stream ends early.
    async fn stream(
        &self,
        model: &str,
        messages: &[Message],
        tokens: mpsc::Sender<String>,
    ) -> Result<(), ProviderError>;
}

/// Splits a server-sent-event byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    /// Feeds a chunk and returns the payloads of every completed `data:` line.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }

    /// Returns a trailing `data:` line the server did not terminate.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let rest = String::from_utf8_lossy(&rest);
        rest.trim()
            .strip_prefix("data:")
            .map(|data| data.trim_start().to_string())
    }
}

/// Forwards a fragment to the consumer. Fails once the consumer is gone.
pub(crate) async fn forward_token(
    provider: ProviderKind,
    tokens: &mpsc::Sender<String>,
    text: &str,
) -> Result<(), ProviderError> {
    if text.is_empty() {
        return Ok(());
    }
    tokens
        .send(text.to_string())
        .await
        .map_err(|_| ProviderError::new(provider, "token consumer closed"))
}

/// Reads a failed response into a [`ProviderError`].
pub(crate) async fn error_from_response(provider: ProviderKind, resp: reqwest::Response) -> ProviderError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ProviderError::from_response(provider, status, &body)
}
