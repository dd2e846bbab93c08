//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycles against the router, with a manual
//! clock so freshness is deterministic.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use recommendation_cache::{
    api::create_router,
    cache::{ManualClock, RecommendationCache},
    AppState, Config,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let cache = RecommendationCache::new(Config::default(), clock.clone()).unwrap();
    (create_router(AppState::new(cache)), clock)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

const TWO_RECORDS: &str = r#"{"records":[
    {"requestId":2,"status":"COMPLETED","priorityScore":90,"urgencyLevel":"HIGH","recommendationText":"Daily check-in calls"},
    {"requestId":1,"status":"PENDING"}
]}"#;

// == Scope Endpoint Tests ==

#[tokio::test]
async fn test_put_then_get_scope() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, "PUT", "/scopes/user-3", Some(TWO_RECORDS)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert!(json["message"].as_str().unwrap().contains("user-3"));

    let (status, json) = send(&app, "GET", "/scopes/user-3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hit"], true);
    assert_eq!(json["scope"], "user-3");
    let records = json["records"].as_array().unwrap();
    assert_eq!(records[0]["requestId"], 2);
    assert_eq!(records[0]["urgencyLevel"], "HIGH");
    assert_eq!(records[1]["requestId"], 1);
}

#[tokio::test]
async fn test_scope_ttl_via_api() {
    let (app, clock) = create_test_app();

    let body = r#"{"records":[{"requestId":1,"status":"PENDING"}]}"#;
    send(&app, "PUT", "/scopes/all", Some(body)).await;

    clock.set(100_000);
    let (_, json) = send(&app, "GET", "/scopes/all?ttl_ms=300000", None).await;
    assert_eq!(json["hit"], true);
    assert_eq!(json["records"].as_array().unwrap().len(), 1);

    clock.set(400_000);
    let (status, json) = send(&app, "GET", "/scopes/all?ttl_ms=300000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hit"], false);
    assert!(json.get("records").is_none());
}

#[tokio::test]
async fn test_scope_isolation_via_api() {
    let (app, _) = create_test_app();

    send(&app, "PUT", "/scopes/user-1", Some(TWO_RECORDS)).await;

    let (_, json) = send(&app, "GET", "/scopes/all", None).await;
    assert_eq!(json["hit"], false);
}

#[tokio::test]
async fn test_invalid_scope_and_ttl() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, "GET", "/scopes/user-abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("scope key"));

    let (status, _) = send(&app, "GET", "/scopes/all?ttl_ms=-5", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_record_rejected_without_side_effects() {
    let (app, _) = create_test_app();

    let body = r#"{"records":[{"requestId":1,"status":"PENDING"},{"requestId":2,"status":"COMPLETED"}]}"#;
    let (status, json) = send(&app, "PUT", "/scopes/all", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("no text"));

    let (status, _) = send(&app, "GET", "/records/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_out_of_range_scores_share_one_status() {
    let (app, _) = create_test_app();

    for score in [101, 255, 256, 70_000] {
        let body = format!(r#"{{"records":[{{"requestId":1,"status":"PENDING","priorityScore":{}}}]}}"#, score);
        let (status, json) = send(&app, "PUT", "/scopes/all", Some(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "score {}", score);
        assert!(json["error"].as_str().unwrap().contains("priority score"));
    }

    let (status, _) = send(&app, "GET", "/records/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalidate_scope_keeps_records() {
    let (app, _) = create_test_app();
    send(&app, "PUT", "/scopes/all", Some(TWO_RECORDS)).await;

    let (status, json) = send(&app, "DELETE", "/scopes/all", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);

    let (_, json) = send(&app, "GET", "/scopes/all", None).await;
    assert_eq!(json["hit"], false);

    let (status, _) = send(&app, "GET", "/records/2", None).await;
    assert_eq!(status, StatusCode::OK);
}

// == Record Endpoint Tests ==

#[tokio::test]
async fn test_record_get_and_idempotent_delete() {
    let (app, _) = create_test_app();
    send(&app, "PUT", "/scopes/all", Some(TWO_RECORDS)).await;

    let (status, json) = send(&app, "GET", "/records/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["priorityScore"], 90);
    assert_eq!(json["recommendationText"], "Daily check-in calls");

    let (status, json) = send(&app, "DELETE", "/records/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);

    let (status, json) = send(&app, "DELETE", "/records/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], false);

    let (status, _) = send(&app, "GET", "/records/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Processing Endpoint Tests ==

#[tokio::test]
async fn test_processing_lifecycle_via_api() {
    let (app, _) = create_test_app();
    send(&app, "PUT", "/scopes/all", Some(TWO_RECORDS)).await;

    let (_, json) = send(&app, "GET", "/processing/1", None).await;
    assert_eq!(json["status"], "idle");

    let (status, json) = send(&app, "PUT", "/processing/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processing");

    let (_, json) = send(&app, "GET", "/processing", None).await;
    assert_eq!(json["processing"], serde_json::json!([1]));

    let (_, json) = send(&app, "POST", "/processing/1/complete", None).await;
    assert_eq!(json["status"], "completed");
    assert!(json["completedAt"].is_u64());

    let (status, _) = send(&app, "GET", "/records/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&app, "GET", "/scopes/all", None).await;
    assert_eq!(json["hit"], false);
}

#[tokio::test]
async fn test_processing_failure_via_api() {
    let (app, _) = create_test_app();
    send(&app, "PUT", "/scopes/all", Some(TWO_RECORDS)).await;
    send(&app, "PUT", "/processing/2", None).await;

    let (status, json) = send(&app, "POST", "/processing/2/fail", Some(r#"{"error":"timeout"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "failed");
    assert_eq!(json["error"], "timeout");

    let (status, _) = send(&app, "GET", "/records/2", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/processing/2/fail", Some(r#"{"error":""}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// == Maintenance Endpoint Tests ==

#[tokio::test]
async fn test_stats_and_clear() {
    let (app, _) = create_test_app();
    send(&app, "PUT", "/scopes/user-1", Some(TWO_RECORDS)).await;
    send(&app, "GET", "/scopes/user-1", None).await;
    send(&app, "GET", "/scopes/all", None).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["entryCount"], 2);
    assert_eq!(json["scopeCount"], 1);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["hitRate"], 0.5);

    let (status, _) = send(&app, "DELETE", "/cache", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(json["entryCount"], 0);
    assert_eq!(json["scopeCount"], 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_invalid_json_request() {
    let (app, _) = create_test_app();

    let (status, _) = send(&app, "PUT", "/scopes/all", Some("not json")).await;
    assert!(status.is_client_error());
}
