//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use blueprint::{
    api::create_router,
    cache::{CacheStore, MemoryBackend},
    error::StoreError,
    models::{CallRequest, CallResponse},
    service::{BlueprintHandler, HandlerConfig, PersistentStore},
    AppState, RateLimiter,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_handler(limit: usize) -> BlueprintHandler {
    let cache = Arc::new(CacheStore::new(Arc::new(MemoryBackend::new(100))));
    let limiter = Arc::new(RateLimiter::new(limit, Duration::from_secs(60)));
    BlueprintHandler::builder(HandlerConfig::default(), cache, limiter).build()
}

fn create_test_app() -> Router {
    create_router(AppState::new(Arc::new(create_handler(100))))
}

fn call(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/call")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

struct DownStore;

#[async_trait]
impl PersistentStore for DownStore {
    async fn query(&self, _statement: &str) -> Result<i64, StoreError> {
        Err(StoreError::Join("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Join("connection refused".to_string()))
    }
}

// == Call Endpoint Tests ==

#[tokio::test]
async fn test_call_endpoint_success() {
    let app = create_test_app();

    let response = app.oneshot(call(r#"{"name":"Alice"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Hello Alice from blueprint");
}

#[tokio::test]
async fn test_repeat_call_served_from_cache() {
    let app = create_test_app();

    for _ in 0..2 {
        let response = app.clone().oneshot(call(r#"{"name":"Alice"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    let metrics = body_to_json(response.into_body()).await;
    assert_eq!(metrics["total_requests"], 2);
    assert_eq!(metrics["cache_misses"], 1);
    assert_eq!(metrics["cache_hits"], 1);

    let response = app.oneshot(get("/cache/stats")).await.unwrap();
    let stats = body_to_json(response.into_body()).await;
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["sets"], 1);
    assert_eq!(stats["hit_rate"], 0.5);
}

// == Error Response Tests ==

#[tokio::test]
async fn test_empty_name_request() {
    let app = create_test_app();

    let response = app.oneshot(call(r#"{"name":""}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "INVALID_ARGUMENT");
    assert_eq!(json["error"], "name is required");
}

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app.oneshot(call(r#"{"name": 42"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "INVALID_ARGUMENT");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_rate_limited_request() {
    let app = create_router(AppState::new(Arc::new(create_handler(2))));

    for _ in 0..2 {
        let response = app.clone().oneshot(call(r#"{"name":"Alice"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(call(r#"{"name":"Alice"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "RESOURCE_EXHAUSTED");

    // Other identifiers are unaffected
    let response = app.oneshot(call(r#"{"name":"Bob"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_endpoint_store_down() {
    let cache = Arc::new(CacheStore::new(Arc::new(MemoryBackend::new(100))));
    let handler = BlueprintHandler::builder(HandlerConfig::default(), cache, Arc::default())
        .store(Arc::new(DownStore))
        .build();
    let app = create_router(AppState::new(Arc::new(handler)));

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "UNAVAILABLE");
    assert_eq!(json["error"], "persistent store unavailable");
}

// == Metrics Endpoint Tests ==

#[tokio::test]
async fn test_metrics_reset_endpoint() {
    let app = create_test_app();
    app.clone().oneshot(call(r#"{"name":""}"#)).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/metrics/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_requests"], 0);
    assert_eq!(json["failed_calls"], 0);
    assert_eq!(json["avg_response_time_ms"], 0.0);
}

// == End-to-End Over TCP ==

#[tokio::test]
async fn test_end_to_end_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, create_test_app()).await.unwrap();
    });

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{address}/v1/call"))
        .json(&CallRequest::new("Alice"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: CallResponse = response.json().await.unwrap();
    assert_eq!(body, CallResponse::new("Hello Alice from blueprint"));

    server.abort();
}
