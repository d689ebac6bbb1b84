//! HTTP API gateway for Concierge.
//!
//! Exposes the chat stream, its SSE variant, thread inspection, direct
//! passthroughs to the upstream services and a health check. Built on Axum.

pub mod bootstrap;
pub mod chat;
pub mod services;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub use bootstrap::{Runtime, assemble, build_runtime};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub runtime: Runtime,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat::chat_handler))
        .route("/v1/chat/stream", post(chat::chat_stream_handler))
        .route("/v1/threads", get(chat::list_threads_handler))
        .route("/v1/threads/{id}", get(chat::get_thread_handler))
        .route("/api/valueserp/search_places", post(services::search_places_handler))
        .route("/api/valueserp/place_details", post(services::place_details_handler))
        .route("/api/youcom/query_web_llm", post(services::query_web_llm_handler))
        .route("/api/youcom/get_ai_snippets", post(services::ai_snippets_handler))
        .route("/api/anthropic/generate", post(services::generate_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: concierge_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let runtime = build_runtime(&config).await?;
    let app = build_router(Arc::new(GatewayState { runtime }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
