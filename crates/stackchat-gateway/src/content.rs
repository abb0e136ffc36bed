use crate::error::ApiError;
use crate::server::{stack_config_header, AppState};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use stackchat_core::StackConfig;
use stackchat_retrieval::FilterSet;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

fn resolve_credentials(state: &AppState, headers: &HeaderMap) -> Result<StackConfig, ApiError> {
    let header = stack_config_header(headers);
    let (config, source) = state.orchestrator.credentials().resolve(None, header.as_ref())?;
    info!(?source, "Resolved Contentstack credentials");
    Ok(config)
}

/// `GET /chat/tours?<field>=<value>...`
pub async fn tours_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let credentials = resolve_credentials(&state, &headers)?;
    let filters = FilterSet::from_query(&params);
    info!(filters = ?filters, "Tours search");

    match state.content.search_entries("tour", &filters, &credentials).await {
        Ok(tours) if tours.is_empty() => Err(ApiError::NotFound("No tours found".into())),
        Ok(tours) => Ok(Json(json!({ "tours": tours }))),
        Err(e) => {
            error!(error = %e, "Tours search failed");
            Err(ApiError::Internal("Failed to fetch tours".into()))
        }
    }
}

/// `GET /chat/entries/{content_type}/{uid}`
pub async fn entry_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((content_type, uid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let credentials = resolve_credentials(&state, &headers)?;

    match state.content.get_entry(&content_type, &uid, &credentials).await {
        Ok(Some(entry)) => Ok(Json(json!({ "entry": entry }))),
        Ok(None) => Err(ApiError::NotFound("Entry not found".into())),
        Err(e) => {
            error!(%content_type, %uid, error = %e, "Entry lookup failed");
            Err(ApiError::Internal("Failed to fetch entry".into()))
        }
    }
}

/// `POST /chat/validate-stack`
///
/// Always answers 200; the outcome is in `success`.
pub async fn validate_stack_handler(
    State(state): State<Arc<AppState>>,
    Json(config): Json<StackConfig>,
) -> Json<Value> {
    if let Err(e) = config.validate() {
        return Json(json!({ "success": false, "error": e.to_string() }));
    }

    match state.content.probe(&config).await {
        Ok(()) => {
            info!(environment = %config.environment, "Stack credentials validated");
            Json(json!({ "success": true, "message": "Stack credentials are valid" }))
        }
        Err(e) => {
            info!(error = %e, "Stack credentials rejected");
            Json(json!({ "success": false, "error": format!("Could not reach the stack: {e}") }))
        }
    }
}
