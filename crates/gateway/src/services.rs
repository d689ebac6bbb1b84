//! Passthrough routes onto the upstream services.
//!
//! - `POST /api/valueserp/search_places`  — `{query, location}`
//! - `POST /api/valueserp/place_details`  — `{data_cid}`
//! - `POST /api/youcom/query_web_llm`     — `{query}`
//! - `POST /api/youcom/get_ai_snippets`   — `{query}`
//! - `POST /api/anthropic/generate`       — raw completion, no tools
//!
//! These reuse the runtime's clients, so they share its keys, timeouts and
//! retry policy. Nothing here touches conversation threads.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use concierge_core::error::ProviderError;
use concierge_core::message::{Message, Role};
use concierge_core::provider::{ProviderRequest, ProviderResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::SharedState;
use crate::chat::{ApiError, api_error};

fn upstream_error(service: &str, e: ProviderError) -> ApiError {
    let status = match &e {
        ProviderError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        ProviderError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ProviderError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!(service, status = status.as_u16(), error = %e, "Upstream call failed");
    api_error(status, e.to_string())
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("{field} must not be empty")));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct PlacesRequest {
    pub query: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlacesResponse {
    pub places_results: Vec<Value>,
}

/// `POST /api/valueserp/search_places`
pub async fn search_places_handler(
    State(state): State<SharedState>,
    Json(request): Json<PlacesRequest>,
) -> Result<Json<PlacesResponse>, ApiError> {
    require("query", &request.query)?;
    let places_results = state
        .runtime
        .places
        .search_places(&request.query, request.location.as_deref())
        .await
        .map_err(|e| upstream_error("valueserp", e))?;
    Ok(Json(PlacesResponse { places_results }))
}

#[derive(Debug, Deserialize)]
pub struct DetailsRequest {
    pub data_cid: String,
}

#[derive(Debug, Serialize)]
pub struct DetailsResponse {
    pub place_details: Value,
}

/// `POST /api/valueserp/place_details`
pub async fn place_details_handler(
    State(state): State<SharedState>,
    Json(request): Json<DetailsRequest>,
) -> Result<Json<DetailsResponse>, ApiError> {
    require("data_cid", &request.data_cid)?;
    let place_details = state
        .runtime
        .places
        .place_details(&request.data_cid)
        .await
        .map_err(|e| upstream_error("valueserp", e))?;
    if place_details.is_null() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no place with data_cid {}", request.data_cid),
        ));
    }
    Ok(Json(DetailsResponse { place_details }))
}

#[derive(Debug, Deserialize)]
pub struct WebQuery {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct WebLlmResponse {
    pub results: Value,
}

#[derive(Debug, Serialize)]
pub struct SnippetsResponse {
    pub snippets: Value,
}

/// `POST /api/youcom/query_web_llm`
pub async fn query_web_llm_handler(
    State(state): State<SharedState>,
    Json(request): Json<WebQuery>,
) -> Result<Json<WebLlmResponse>, ApiError> {
    require("query", &request.query)?;
    let results = state
        .runtime
        .web
        .query_web_llm(&request.query)
        .await
        .map_err(|e| upstream_error("youcom", e))?;
    Ok(Json(WebLlmResponse { results }))
}

/// `POST /api/youcom/get_ai_snippets`
pub async fn ai_snippets_handler(
    State(state): State<SharedState>,
    Json(request): Json<WebQuery>,
) -> Result<Json<SnippetsResponse>, ApiError> {
    require("query", &request.query)?;
    let snippets = state
        .runtime
        .web
        .search(&request.query)
        .await
        .map_err(|e| upstream_error("youcom", e))?;
    Ok(Json(SnippetsResponse { snippets }))
}

#[derive(Debug, Deserialize)]
pub struct GenerateMessage {
    pub role: Role,
    pub content: String,
}

/// Unset fields fall back to the deployment's generation settings.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub messages: Vec<GenerateMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
}

/// `POST /api/anthropic/generate`
pub async fn generate_handler(
    State(state): State<SharedState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<ProviderResponse>, ApiError> {
    if request.messages.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "messages must not be empty"));
    }
    let messages = request
        .messages
        .into_iter()
        .map(|m| match m.role {
            Role::User => Ok(Message::user(m.content)),
            Role::Assistant => Ok(Message::assistant(m.content)),
            Role::Tool => Err(api_error(
                StatusCode::BAD_REQUEST,
                "only user and assistant messages can be sent",
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let model = &state.runtime.model;
    let defaults = model.config();
    let provider_request = ProviderRequest {
        model: request.model.unwrap_or_else(|| defaults.model.clone()),
        system: request.system,
        messages,
        temperature: request.temperature.unwrap_or(defaults.temperature),
        max_tokens: request.max_tokens.or(defaults.max_tokens),
        tools: Vec::new(),
        stop: request.stop_sequences.unwrap_or_else(|| defaults.stop.clone()),
    };

    let response = model
        .generate(provider_request)
        .await
        .map_err(|e| upstream_error(model.provider_name(), e))?;
    Ok(Json(response))
}
