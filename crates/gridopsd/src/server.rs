//! HTTP server for gridopsd

use crate::pipeline::Pipeline;
use crate::routes;
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use gridops_shared::{ErrorKind, Intent, ResponseEnvelope};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info};

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            start_time: Instant::now(),
        }
    }
}

/// All routes with the service middleware applied
pub fn app(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let router = Router::new()
        .merge(routes::chat_routes())
        .merge(routes::health_routes())
        .with_state(state);
    with_middleware(router, request_timeout)
}

/// Panic catching, deadline, CORS and tracing, innermost first
pub fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    let envelope = ResponseEnvelope::error(
        Intent::Query,
        ErrorKind::Internal,
        "Internal server error",
    );
    (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response()
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState, bind: &str, request_timeout: Duration) -> Result<()> {
    let app = app(Arc::new(state), request_timeout);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    info!("  Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down gracefully");
}
