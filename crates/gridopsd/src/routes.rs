//! API routes for gridopsd

use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use gridops_shared::{ChatRequest, ErrorKind, Intent, ResponseEnvelope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Chat Routes
// ============================================================================

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/chat", post(chat))
}

/// Pipeline ERROR envelopes are still 200; only malformed input is 400.
async fn chat(
    State(state): State<AppStateArc>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ResponseEnvelope>) {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected chat body: {}", rejection.body_text());
            return invalid(&rejection.body_text());
        }
    };

    if request.message.trim().is_empty() {
        return invalid("Message must not be empty");
    }

    let envelope = state.pipeline.handle(&request).await;
    (StatusCode::OK, Json(envelope))
}

fn invalid(content: &str) -> (StatusCode, Json<ResponseEnvelope>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ResponseEnvelope::error(
            Intent::Query,
            ErrorKind::InvalidRequest,
            content,
        )),
    )
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/health", get(health))
        .route("/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "gridopsd".to_string(),
        version: gridops_shared::VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
