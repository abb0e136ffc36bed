use super::{error_from_response, forward_token, LlmBackend, SseBuffer};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures_util::StreamExt;
use stackchat_core::{Message, Role};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// OpenAI-compatible chat completions backend.
///
/// Serves both OpenAI and Groq, which exposes the same API under its own base URL.
pub struct OpenAiBackend {
    kind: ProviderKind,
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Builds a backend for `kind` from its settings.
    pub fn new(kind: ProviderKind, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProviderError::transport(kind, &e))?;
        Ok(Self {
            kind,
            base_url: config.base_url(kind).to_string(),
            api_key: config.api_key().to_string(),
            http,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_messages(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                let mut msg = serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                });
                if m.role == Role::Assistant && !m.tool_calls.is_empty() {
                    msg["tool_calls"] = m
                        .tool_calls
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "id": call.id,
                                "type": "function",
                                "function": { "name": call.name, "arguments": call.arguments },
                            })
                        })
                        .collect();
                }
                if let Some(id) = &m.tool_call_id {
                    msg["tool_call_id"] = serde_json::json!(id);
                }
                msg
            })
            .collect()
    }

    /// Declares every tool referenced in the history so the vendor accepts
    /// the tool messages. `tool_choice: none` keeps the model from calling them.
    fn build_body(&self, model: &str, messages: &[Message], stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": self.build_messages(messages),
            "stream": stream,
        });

        let tools: BTreeSet<&str> = messages
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|c| c.name.as_str()))
            .collect();
        if !tools.is_empty() {
            body["tools"] = tools
                .into_iter()
                .map(|name| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": name,
                            "parameters": { "type": "object" },
                        }
                    })
                })
                .collect();
            body["tool_choice"] = serde_json::json!("none");
        }
        body
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(self.kind, &e))?;

        if !resp.status().is_success() {
            return Err(error_from_response(self.kind, resp).await);
        }
        Ok(resp)
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<Message, ProviderError> {
        let resp = self.post(&self.build_body(model, messages, false)).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::transport(self.kind, &e))?;
        parse_completion(self.kind, &body)
    }

    async fn stream(
        &self,
        model: &str,
        messages: &[Message],
        tokens: mpsc::Sender<String>,
    ) -> Result<(), ProviderError> {
        let resp = self.post(&self.build_body(model, messages, true)).await?;
        let mut bytes = resp.bytes_stream();
        let mut sse = SseBuffer::default();
        let mut finished = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| ProviderError::transport(self.kind, &e))?;
            for data in sse.push(&chunk) {
                if handle_chunk(self.kind, &data, &tokens, &mut finished).await? {
                    return Ok(());
                }
            }
        }
        if let Some(data) = sse.finish() {
            if handle_chunk(self.kind, &data, &tokens, &mut finished).await? {
                return Ok(());
            }
        }

        if finished {
            debug!(provider = %self.kind, "Stream closed after finish_reason without [DONE]");
            Ok(())
        } else {
            Err(ProviderError::new(
                self.kind,
                format!("{} stream ended before completion", self.kind),
            ))
        }
    }
}

/// Handles one SSE payload. Returns `true` on the `[DONE]` terminator.
async fn handle_chunk(
    kind: ProviderKind,
    data: &str,
    tokens: &mpsc::Sender<String>,
    finished: &mut bool,
) -> Result<bool, ProviderError> {
    if data == "[DONE]" {
        return Ok(true);
    }
    let Ok(json) = serde_json::from_str::<serde_json::Value>(data) else {
        debug!(provider = %kind, "Skipping unparseable stream chunk");
        return Ok(false);
    };
    if let Some(error) = json.get("error") {
        return Err(ProviderError::from_stream_error(kind, error));
    }
    let choice = &json["choices"][0];
    if let Some(text) = choice["delta"]["content"].as_str() {
        forward_token(kind, tokens, text).await?;
    }
    if choice["finish_reason"].is_string() {
        *finished = true;
    }
    Ok(false)
}

fn parse_completion(kind: ProviderKind, body: &serde_json::Value) -> Result<Message, ProviderError> {
    let message = body["choices"]
        .get(0)
        .map(|c| &c["message"])
        .ok_or_else(|| ProviderError::new(kind, format!("{kind} response has no choices")))?;
    let content = message["content"].as_str().unwrap_or_default();
    Ok(Message::assistant(content))
}
