//! HTTP surface tests, driven through the router with `oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use gridopsd::prompts::{CLASSIFIER_ROLE, DATE_ROLE};
use gridopsd::server::{app, with_middleware, AppState};
use gridopsd::{Config, FakeBackend, FakePredictor, FakeStorage, Pipeline, PlotlyRenderer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn router(backend: FakeBackend, storage: FakeStorage) -> Router {
    let pipeline = Pipeline::new(
        Arc::new(backend),
        Arc::new(storage),
        Arc::new(FakePredictor::returning(100.0)),
        Arc::new(PlotlyRenderer),
        &Config::default(),
    );
    app(Arc::new(AppState::new(pipeline)), Duration::from_secs(30))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    for uri in ["/api/health", "/health"] {
        let response = router(FakeBackend::new(), FakeStorage::new())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "gridopsd");
        assert_eq!(json["version"], gridops_shared::VERSION);
    }
}

#[tokio::test]
async fn test_chat_forecast_envelope() {
    let backend = FakeBackend::new()
        .respond_when(CLASSIFIER_ROLE, r#"{"intent": "FORECAST"}"#)
        .respond_when(DATE_ROLE, "2099-01-02");
    let storage = FakeStorage::new().with_feature("2099-01-02", 42.0);

    let response = router(backend, storage)
        .oneshot(post_json(
            "/api/chat",
            r#"{"message": "revenue on 2099-01-02", "backendPreference": "local"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "data");
    assert_eq!(json["intent"], "forecast");
    assert_eq!(json["content"], "Revenue Forecast for 2099-01-02: $100.00");
    assert_eq!(json["table"]["columns"][1], "value");
    assert_eq!(json["insight"]["chart_kind"], "line");
    assert!(json["chart_document"].is_string());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_chat_pipeline_error_is_200() {
    let response = router(FakeBackend::unreachable(), FakeStorage::new())
        .oneshot(post_json(
            "/chat",
            r#"{"message": "usage for user_3", "model_type": "cloud"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "error");
    assert_eq!(json["error"], "BACKEND_CONNECTION");
    assert!(json.get("table").is_none());
}

#[tokio::test]
async fn test_chat_blank_message_is_400() {
    let response = router(FakeBackend::new(), FakeStorage::new())
        .oneshot(post_json("/api/chat", r#"{"message": "   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_chat_unknown_preference_is_400() {
    let response = router(FakeBackend::new(), FakeStorage::new())
        .oneshot(post_json(
            "/api/chat",
            r#"{"message": "hi", "backendPreference": "mainframe"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "error");
    assert_eq!(json["error"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_panic_becomes_internal_envelope() {
    async fn boom() -> &'static str {
        panic!("handler exploded")
    }
    let router = with_middleware(Router::new().route("/boom", get(boom)), Duration::from_secs(5));

    let response = router
        .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "INTERNAL");
}

#[tokio::test]
async fn test_cors_is_permissive() {
    let response = router(FakeBackend::new(), FakeStorage::new())
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("origin", "http://dashboard.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
