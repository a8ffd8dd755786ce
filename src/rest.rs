// Copyright 2026 Netsieve Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for netsieve.
//!
//! `GET /api/scrape?url=…&waitfor=…` is the scrape contract; the other
//! endpoints (health, status, SSE event feed) are operational surface.
//! Every handler is a thin adapter over [`capture::capture`].

use crate::capture::{self, CaptureConfig, CaptureOutcome, CaptureRequest};
use crate::engine::BrowserEngine;
use crate::error::CaptureError;
use crate::events::{self, EventBus};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

/// Shared state behind every handler.
pub struct SharedState {
    pub started_at: Instant,
    pub engine: Arc<dyn BrowserEngine>,
    pub event_bus: Arc<EventBus>,
    pub config: CaptureConfig,
    captures_total: AtomicU64,
    captures_found: AtomicU64,
    captures_not_found: AtomicU64,
    captures_failed: AtomicU64,
}

impl SharedState {
    pub fn new(engine: Arc<dyn BrowserEngine>, config: CaptureConfig) -> Self {
        Self {
            started_at: Instant::now(),
            engine,
            event_bus: Arc::new(EventBus::new(256)),
            config,
            captures_total: AtomicU64::new(0),
            captures_found: AtomicU64::new(0),
            captures_not_found: AtomicU64::new(0),
            captures_failed: AtomicU64::new(0),
        }
    }
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<SharedState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/scrape", get(handle_scrape))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/events", get(events_sse))
        .layer(cors)
        .with_state(state)
}

/// Start the REST server on the given port. Runs until ctrl-c.
pub async fn start(port: u16, state: Arc<SharedState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("scrape API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
        })
        .await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

#[derive(serde::Deserialize, Default)]
struct ScrapeParams {
    url: Option<String>,
    waitfor: Option<String>,
}

/// The scrape contract: 200 with the observed response, 400 on a missing
/// parameter, 404 when nothing matched within the poll budget, 500 when
/// the capture failed.
async fn handle_scrape(
    Query(params): Query<ScrapeParams>,
    State(state): State<Arc<SharedState>>,
) -> (StatusCode, Json<Value>) {
    let (url, waitfor) = match (params.url, params.waitfor) {
        (Some(url), Some(waitfor)) if !url.is_empty() && !waitfor.is_empty() => (url, waitfor),
        _ => return error_response(&CaptureError::MissingParameter),
    };

    state.captures_total.fetch_add(1, Ordering::Relaxed);

    let request = CaptureRequest::new(url, waitfor.clone());
    let outcome = capture::capture(
        state.engine.as_ref(),
        &request,
        &state.config,
        Some(Arc::clone(&state.event_bus)),
    )
    .await;

    match outcome {
        CaptureOutcome::Found(response) => {
            state.captures_found.fetch_add(1, Ordering::Relaxed);
            let body = serde_json::to_value(&response).unwrap_or_else(|_| json!({}));
            (StatusCode::OK, Json(body))
        }
        CaptureOutcome::NotFound => {
            state.captures_not_found.fetch_add(1, Ordering::Relaxed);
            error_response(&CaptureError::NotFound { hint: waitfor })
        }
        CaptureOutcome::Failed(error) => {
            state.captures_failed.fetch_add(1, Ordering::Relaxed);
            error_response(&error)
        }
    }
}

/// Render a capture error as its HTTP status and `{"error": …}` body.
fn error_response(error: &CaptureError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(error.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": error.to_string() })))
}

async fn health(State(state): State<Arc<SharedState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine_available": state.engine.is_available(),
    }))
}

/// Runtime status: uptime, engine state, and capture counters.
async fn handle_status(State(state): State<Arc<SharedState>>) -> Json<Value> {
    Json(json!({
        "running": true,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs_f64(),
        "engine_available": state.engine.is_available(),
        "active_sessions": state.engine.active_sessions(),
        "captures": {
            "total": state.captures_total.load(Ordering::Relaxed),
            "found": state.captures_found.load(Ordering::Relaxed),
            "not_found": state.captures_not_found.load(Ordering::Relaxed),
            "failed": state.captures_failed.load(Ordering::Relaxed),
        },
    }))
}

/// SSE query parameters.
#[derive(serde::Deserialize, Default)]
struct EventsParams {
    target: Option<String>,
}

/// Server-Sent Events endpoint for real-time capture events.
///
/// Subscribes to the event bus and streams events as SSE. Optionally
/// filters by target page URL via `?target=https://example.test/page`.
async fn events_sse(
    Query(params): Query<EventsParams>,
    State(state): State<Arc<SharedState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();
    let target_filter = params.target;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(ref target) = target_filter {
                        if !events::event_matches_target(&event, target) {
                            continue;
                        }
                    }
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    // Missed some events due to slow consumer — continue
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoopEngine;

    #[test]
    fn test_shared_state_counters_start_at_zero() {
        let state = SharedState::new(Arc::new(NoopEngine), CaptureConfig::default());
        assert_eq!(state.captures_total.load(Ordering::Relaxed), 0);
        assert!(!state.engine.is_available());
    }
}
