//! Router-level tests for the scrape API, driven through tower without a
//! listening socket.

use assert_json_diff::assert_json_include;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use netsieve::capture::CaptureConfig;
use netsieve::engine::mock::{MockEngine, ScriptedResponse};
use netsieve::rest::{router, SharedState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn fast_config() -> CaptureConfig {
    CaptureConfig {
        navigation_timeout_ms: Some(1_000),
        poll_interval_ms: 10,
        max_poll_attempts: 10,
    }
}

fn state_with(engine: MockEngine) -> Arc<SharedState> {
    Arc::new(SharedState::new(Arc::new(engine), fast_config()))
}

async fn get(state: Arc<SharedState>, uri: &str) -> (StatusCode, Value) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

#[tokio::test]
async fn missing_both_params_is_400() {
    let (status, body) = get(state_with(MockEngine::new()), "/api/scrape").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing url or waitfor parameter" }));
}

#[tokio::test]
async fn missing_waitfor_is_400() {
    let (status, body) = get(
        state_with(MockEngine::new()),
        "/api/scrape?url=https://example.test/page",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing url or waitfor parameter" }));
}

#[tokio::test]
async fn empty_params_are_treated_as_missing() {
    let (status, _) = get(state_with(MockEngine::new()), "/api/scrape?url=&waitfor=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn matching_response_is_200_with_parsed_body() {
    let engine = MockEngine::with_responses(vec![ScriptedResponse::json(
        "https://example.test/data.json",
        r#"{"a":1}"#,
    )]);
    let (status, body) = get(
        state_with(engine),
        "/api/scrape?url=https://example.test/page&waitfor=json",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: body.clone(),
        expected: json!({
            "url": "https://example.test/data.json",
            "status": 200,
            "body": { "a": 1 },
        })
    );
    assert_eq!(
        body["headers"]["content-type"],
        json!("application/json")
    );
}

#[tokio::test]
async fn no_match_is_404_with_hint_in_message() {
    let (status, body) = get(
        state_with(MockEngine::new()),
        "/api/scrape?url=https://example.test/page&waitfor=json",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "error": "No json file found in network requests" })
    );
}

#[tokio::test]
async fn navigation_failure_is_500_with_navigation_message() {
    let engine = MockEngine::failing_navigation("connection refused");
    let (status, body) = get(
        state_with(engine),
        "/api/scrape?url=https://example.test/page&waitfor=json",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("navigation failed"));
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn engine_failure_is_500() {
    let engine = MockEngine::failing_session("chromium not installed");
    let (status, body) = get(
        state_with(engine),
        "/api/scrape?url=https://example.test/page&waitfor=json",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("chromium not installed"));
}

#[tokio::test]
async fn health_reports_engine_availability() {
    let (status, body) = get(state_with(MockEngine::new()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "ok", "engine_available": true })
    );
}

#[tokio::test]
async fn status_counts_captures() {
    let engine = MockEngine::with_responses(vec![ScriptedResponse::json(
        "https://example.test/data.json",
        r#"{"a":1}"#,
    )]);
    let state = state_with(engine);

    let (_, before) = get(Arc::clone(&state), "/api/v1/status").await;
    assert_eq!(before["captures"]["total"], json!(0));

    let (status, _) = get(
        Arc::clone(&state),
        "/api/scrape?url=https://example.test/page&waitfor=json",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = get(state, "/api/v1/status").await;
    assert_eq!(after["captures"]["total"], json!(1));
    assert_eq!(after["captures"]["found"], json!(1));
    assert_eq!(after["version"], json!(env!("CARGO_PKG_VERSION")));
}
