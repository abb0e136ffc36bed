use crate::error::ApiError;
use crate::server::{stack_config_header, AppState};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use stackchat_agent::{ChatEvent, ChatRequest, FailureKind};
use stackchat_core::{latest_user_message, Message, StackConfig};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

const EVENT_BUFFER: usize = 64;

fn default_stream() -> bool {
    true
}

/// Body of `POST /chat/send`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Conversation, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// `openai`, `groq` or `gemini`.
    #[serde(default)]
    pub model_provider: Option<String>,
    /// Model name in any vendor namespace.
    #[serde(default)]
    pub model_name: Option<String>,
    /// Contentstack credentials for this request.
    #[serde(default)]
    pub stack_config: Option<StackConfig>,
    /// SSE when true, JSON otherwise.
    #[serde(default = "default_stream")]
    pub stream: bool,
}

pub(crate) fn to_sse_event(event: &ChatEvent) -> Event {
    Event::default().event(event.name()).data(event.data().to_string())
}

/// Runs one chat turn, streamed as SSE or answered as JSON.
pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SendRequest>,
) -> Result<Response, ApiError> {
    if body.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".into()));
    }
    if latest_user_message(&body.messages).is_none() {
        return Err(ApiError::BadRequest("No user message found".into()));
    }
    let messages = state
        .sanitizer
        .sanitize_messages(body.messages)
        .map_err(ApiError::BadRequest)?;

    let header_credentials = stack_config_header(&headers);
    if let Some(supplied) = body.stack_config.as_ref().or(header_credentials.as_ref()) {
        supplied.validate()?;
    }

    let request = ChatRequest {
        messages,
        provider: body.model_provider,
        model: body.model_name,
        credentials: body.stack_config,
        header_credentials,
    };
    info!(
        provider = request.provider.as_deref().unwrap_or("default"),
        messages = request.messages.len(),
        stream = body.stream,
        "Chat request"
    );

    if !body.stream {
        return Ok(match state.orchestrator.reply(request).await {
            Ok(reply) => Json(reply).into_response(),
            Err(failure) => {
                warn!(error = %failure, "Chat reply failed");
                let status = match failure.kind {
                    FailureKind::Credentials => StatusCode::BAD_REQUEST,
                    FailureKind::Provider => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Json(failure)).into_response()
            }
        });
    }

    let (tx, rx) = mpsc::channel::<ChatEvent>(EVENT_BUFFER);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.run(request, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(to_sse_event(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()).into_response())
}
