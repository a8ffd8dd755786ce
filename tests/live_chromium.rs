//! End-to-end capture against a real Chromium, with the target page served
//! locally so no external network is involved.

use netsieve::capture::{self, CaptureConfig, CaptureOutcome, CaptureRequest};
use netsieve::engine::chromium::ChromiumEngine;
use netsieve::engine::BrowserEngine;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
#[ignore] // Requires Chromium to be installed
async fn capture_background_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><script>fetch('/data.json');</script></body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#, "application/json"))
        .mount(&server)
        .await;

    let engine = ChromiumEngine::new().await.expect("failed to launch Chromium");
    let request = CaptureRequest::new(format!("{}/page", server.uri()), "json");

    let outcome = capture::capture(&engine, &request, &CaptureConfig::default(), None).await;
    match outcome {
        CaptureOutcome::Found(response) => {
            assert!(response.url.ends_with("data.json"));
            assert_eq!(response.status, 200);
            assert_eq!(response.body, json!({"a": 1}));
        }
        other => panic!("expected Found, got {other:?}"),
    }

    engine.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
#[ignore] // Requires Chromium to be installed
async fn no_background_fetch_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html><body>static</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let engine = ChromiumEngine::new().await.expect("failed to launch Chromium");
    let request = CaptureRequest::new(format!("{}/page", server.uri()), "json");

    let config = CaptureConfig {
        navigation_timeout_ms: Some(10_000),
        poll_interval_ms: 100,
        max_poll_attempts: 10,
    };
    let outcome = capture::capture(&engine, &request, &config, None).await;
    assert!(matches!(outcome, CaptureOutcome::NotFound));
}
