use super::{error_from_response, forward_token, LlmBackend, SseBuffer};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures_util::StreamExt;
use stackchat_core::Message;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const KIND: ProviderKind = ProviderKind::Gemini;

/// Google Gemini `generateContent` backend.
///
/// The conversation is flattened into a single user prompt of `role: content`
/// lines; tool messages appear as `tool:` lines.
pub struct GeminiBackend {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl GeminiBackend {
    /// Builds a backend from the Gemini settings.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProviderError::transport(KIND, &e))?;
        Ok(Self {
            base_url: config.base_url(KIND).to_string(),
            api_key: config.api_key().to_string(),
            http,
        })
    }

    fn url(&self, model: &str, stream: bool) -> String {
        if stream {
            format!("{}/v1beta/models/{model}:streamGenerateContent?alt=sse", self.base_url)
        } else {
            format!("{}/v1beta/models/{model}:generateContent", self.base_url)
        }
    }

    async fn post(&self, url: &str, messages: &[Message]) -> Result<reqwest::Response, ProviderError> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": flatten_prompt(messages) }],
            }]
        });
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(KIND, &e))?;

        if !resp.status().is_success() {
            return Err(error_from_response(KIND, resp).await);
        }
        Ok(resp)
    }
}

fn flatten_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| !m.text().is_empty())
        .map(|m| format!("{}: {}", m.role.as_str(), m.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenates the text parts of the first candidate.
fn candidate_text(body: &serde_json::Value) -> Result<String, ProviderError> {
    if let Some(error) = body.get("error") {
        return Err(ProviderError::from_stream_error(KIND, error));
    }
    let parts = body["candidates"][0]["content"]["parts"].as_array();
    Ok(parts
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<String>())
        .unwrap_or_default())
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<Message, ProviderError> {
        let resp = self.post(&self.url(model, false), messages).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::transport(KIND, &e))?;
        Ok(Message::assistant(candidate_text(&body)?))
    }

    async fn stream(
        &self,
        model: &str,
        messages: &[Message],
        tokens: mpsc::Sender<String>,
    ) -> Result<(), ProviderError> {
        let resp = self.post(&self.url(model, true), messages).await?;
        let mut bytes = resp.bytes_stream();
        let mut sse = SseBuffer::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| ProviderError::transport(KIND, &e))?;
            for data in sse.push(&chunk) {
                handle_chunk(&data, &tokens).await?;
            }
        }
        if let Some(data) = sse.finish() {
            handle_chunk(&data, &tokens).await?;
        }
        // The SSE stream has no terminator; closing it is completion.
        Ok(())
    }
}

async fn handle_chunk(data: &str, tokens: &mpsc::Sender<String>) -> Result<(), ProviderError> {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(data) else {
        debug!("Skipping unparseable Gemini chunk");
        return Ok(());
    };
    forward_token(KIND, tokens, &candidate_text(&json)?).await
}
