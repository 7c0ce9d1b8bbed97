use super::AppState;
use crate::error::RelayError;
use crate::llm::chat::UpstreamError;
use crate::llm::LlmType;
use crate::models::catalog::{ catalog, find_model, ModelCatalog };
use crate::models::chat::ChatReply;
use crate::validation::normalize_chat_request;
use axum::{
    body::Bytes,
    extract::State,
    http::Uri,
    Json,
};
use chrono::{ DateTime, Utc };
use log::{ debug, error, info };
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime: f64,
    pub upstream_configured: bool,
    pub provider: LlmType,
    pub tracked_clients: usize,
}

/// `POST /api/chat`. The rate limit has already been applied by the time this runs.
pub async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatReply>, RelayError> {
    let raw: JsonValue = serde_json::from_slice(&body).map_err(|e| {
        debug!("Rejected chat request body: {}", e);
        RelayError::InvalidRequest("request body must be a JSON object with a messages array".into())
    })?;

    let request = normalize_chat_request(&raw, &state.default_model).map_err(|e| {
        debug!("Rejected chat request: {}", e);
        e
    })?;

    let client = state.chat_client.as_ref().ok_or_else(|| {
        error!("Chat request refused: {} API key is not configured", state.provider);
        RelayError::ApiKeyMissing
    })?;

    if find_model(&request.model).is_none() {
        debug!("Model '{}' is not in the catalog; forwarding anyway", request.model);
    }
    info!(
        "Processing chat request with model: {} ({} turns)",
        request.model,
        request.messages.len()
    );

    let outcome = match tokio::time::timeout(state.request_timeout, client.complete(&request)).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(state.request_timeout)),
    };

    let completion = outcome.map_err(|e| {
        error!("{} API error: {}", state.provider, e);
        RelayError::from(e)
    })?;

    info!(
        "Completion {} generated by {} ({} tokens)",
        completion.completion_id,
        completion.model_used,
        completion.token_count
    );

    Ok(Json(ChatReply {
        message: completion.text,
        model: completion.model_used,
        tokens: completion.token_count,
        id: completion.completion_id,
        timestamp: Utc::now(),
    }))
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "Chatbot Relay API",
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        upstream_configured: state.chat_client.is_some(),
        provider: state.provider,
        tracked_clients: state.limiter.tracked_identities(),
    })
}

pub async fn models_handler() -> Json<ModelCatalog> {
    Json(catalog())
}

pub async fn not_found_handler(uri: Uri) -> RelayError {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    RelayError::NotFound(path)
}
