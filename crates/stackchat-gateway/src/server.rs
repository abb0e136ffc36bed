use crate::chat::send_handler;
use crate::content::{entry_handler, tours_handler, validate_stack_handler};
use crate::sanitizer::{loggable_header, Sanitizer};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use stackchat_agent::ChatOrchestrator;
use stackchat_core::StackConfig;
use stackchat_retrieval::ContentSource;
use std::sync::Arc;
use tracing::warn;

/// Header carrying a JSON [`StackConfig`] as a backup to the request body.
pub const STACK_CONFIG_HEADER: &str = "x-stack-config";

/// Shared application state.
pub struct AppState {
    /// Runs chat turns.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// CMS used by the content endpoints.
    pub content: Arc<dyn ContentSource>,
    /// Inbound message cleaning.
    pub sanitizer: Sanitizer,
}

impl AppState {
    /// Bundles the shared handler state.
    pub fn new(orchestrator: Arc<ChatOrchestrator>, content: Arc<dyn ContentSource>, sanitizer: Sanitizer) -> Self {
        Self {
            orchestrator,
            content,
            sanitizer,
        }
    }
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Builds the router with every route.
    pub fn build(state: AppState) -> Router {
        let state = Arc::new(state);
        Router::new()
            .route("/chat/send", post(send_handler))
            .route("/chat/tours", get(tours_handler))
            .route("/chat/entries/{content_type}/{uid}", get(entry_handler))
            .route("/chat/validate-stack", post(validate_stack_handler))
            .route("/ping", get(ping_handler))
            .with_state(state)
    }
}

async fn ping_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "ok", "service": "stackchat"}))
}

/// Reads the credential header. An unparseable header counts as absent.
pub(crate) fn stack_config_header(headers: &HeaderMap) -> Option<StackConfig> {
    let raw = headers.get(STACK_CONFIG_HEADER)?.to_str().ok()?;
    match serde_json::from_str::<StackConfig>(raw) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(
                header = %loggable_header(raw),
                error = %e,
                "Ignoring unparseable x-stack-config header"
            );
            None
        }
    }
}
