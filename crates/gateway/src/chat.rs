//! Chat and thread endpoints.
//!
//! - `POST /api/chat`          — newline-delimited JSON, one line per chunk
//! - `POST /v1/chat/stream`    — the same chunks as server-sent events
//! - `GET  /v1/threads`        — known thread ids
//! - `GET  /v1/threads/{id}`   — a thread's transcript and tool outputs

use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Response},
};
use concierge_agent::TurnChunk;
use concierge_core::error::ErrorKind;
use concierge_core::message::{ConversationState, ThreadId};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::{error, info};

use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Continue an existing thread; a new one is started when absent.
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

/// One NDJSON line of the chat stream.
#[derive(Debug, Serialize)]
struct ChatLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorKind>,
}

fn ndjson_line(chunk: &TurnChunk) -> String {
    let line = ChatLine {
        kind: chunk.event_type(),
        content: chunk.content(),
        tool_calls: match chunk {
            TurnChunk::Message { message, .. } => message.tool_calls.iter().map(|tc| tc.name.as_str()).collect(),
            _ => Vec::new(),
        },
        error: match chunk {
            TurnChunk::Error { kind, .. } => Some(*kind),
            _ => None,
        },
    };
    let mut out = serde_json::to_string(&line).unwrap_or_default();
    out.push('\n');
    out
}

fn thread_for(request: &ChatRequest) -> Result<ThreadId, ApiError> {
    if request.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    Ok(match &request.thread_id {
        Some(id) if !id.trim().is_empty() => ThreadId::from(id.as_str()),
        _ => ThreadId::new(),
    })
}

/// `POST /api/chat`
pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let thread_id = thread_for(&payload)?;
    info!(thread_id = %thread_id, message_len = payload.message.len(), "Chat request");

    let stream = state
        .runtime
        .transport
        .submit_turn(thread_id.clone(), payload.message)
        .map(|chunk| Ok::<_, Infallible>(ndjson_line(&chunk)));

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-ndjson".to_string()),
            (header::HeaderName::from_static("x-thread-id"), thread_id.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `POST /v1/chat/stream`
pub async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let thread_id = thread_for(&payload)?;
    info!(thread_id = %thread_id, "Chat SSE request");

    let stream = state
        .runtime
        .transport
        .submit_turn(thread_id, payload.message)
        .map(|chunk| {
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            Ok(SseEvent::default().event(chunk.event_type()).data(data))
        });

    Ok(Sse::new(stream))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadListResponse {
    pub threads: Vec<String>,
}

/// `GET /v1/threads`
pub async fn list_threads_handler(State(state): State<SharedState>) -> Result<Json<ThreadListResponse>, ApiError> {
    let threads = state.runtime.conversations.threads().await.map_err(|e| {
        error!(error = %e, "Failed to list threads");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(ThreadListResponse {
        threads: threads.into_iter().map(|t| t.0).collect(),
    }))
}

/// `GET /v1/threads/{id}`
pub async fn get_thread_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationState>, ApiError> {
    let store = &state.runtime.conversations;
    let thread_id = ThreadId::from(id);
    let known = store
        .contains(&thread_id)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !known {
        return Err(api_error(StatusCode::NOT_FOUND, format!("no thread {thread_id}")));
    }

    let conversation = store.get(&thread_id).await.map_err(|e| {
        error!(thread_id = %thread_id, error = %e, "Failed to load thread");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(conversation))
}
