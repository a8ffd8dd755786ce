//! Response capture — the shared core behind every entry point.
//!
//! One capture drives one isolated browser session: register a response
//! observer, navigate, then poll a first-write-wins slot until a matching
//! response appears or the poll budget runs out. The session is released
//! on every exit path before the outcome is returned.

use crate::engine::{BrowserEngine, BrowserSession};
use crate::error::CaptureError;
use crate::events::{self, CaptureEvent, EventBus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One capture request. Immutable for the request's lifetime.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Target page URL. Presence is the only validation; an invalid URL
    /// surfaces as a navigation failure, not a separate error kind.
    pub target_url: String,
    /// Pseudo file-extension hint (`waitfor`), matched against response URLs.
    pub match_hint: String,
}

impl CaptureRequest {
    pub fn new(target_url: impl Into<String>, match_hint: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            match_hint: match_hint.into(),
        }
    }
}

/// The first network response that matched the hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedResponse {
    pub url: String,
    pub status: u16,
    /// Header names are lowercased so lookups are case-insensitive.
    pub headers: HashMap<String, String>,
    /// Parsed JSON when the content-type contains `json`, raw text otherwise.
    pub body: Value,
}

/// Terminal result of one capture attempt.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Found(ObservedResponse),
    NotFound,
    Failed(CaptureError),
}

impl CaptureOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureOutcome::Found(_) => "found",
            CaptureOutcome::NotFound => "not_found",
            CaptureOutcome::Failed(_) => "failed",
        }
    }
}

/// Tunables for one capture attempt.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Upper bound on navigation plus network-idle settling.
    /// `None` means no explicit bound.
    pub navigation_timeout_ms: Option<u64>,
    /// Sleep between checks of the match slot.
    pub poll_interval_ms: u64,
    /// Number of polls before giving up with `NotFound`.
    pub max_poll_attempts: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: Some(30_000),
            poll_interval_ms: 100,
            max_poll_attempts: 50,
        }
    }
}

impl CaptureConfig {
    /// Defaults overridden by `NETSIEVE_NAV_TIMEOUT_MS` (0 disables the
    /// bound), `NETSIEVE_POLL_INTERVAL_MS`, and `NETSIEVE_MAX_POLL_ATTEMPTS`.
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("NETSIEVE_NAV_TIMEOUT_MS") {
            if let Ok(ms) = v.trim().parse::<u64>() {
                config.navigation_timeout_ms = if ms == 0 { None } else { Some(ms) };
            }
        }
        if let Ok(v) = std::env::var("NETSIEVE_POLL_INTERVAL_MS") {
            if let Ok(ms) = v.trim().parse() {
                config.poll_interval_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("NETSIEVE_MAX_POLL_ATTEMPTS") {
            if let Ok(n) = v.trim().parse() {
                config.max_poll_attempts = n;
            }
        }
        config
    }
}

/// Does `url` match the `waitfor` hint?
///
/// A URL matches when it contains `"." + hint` or ends with `"." + hint`.
/// This is a deliberately loose pseudo-extension heuristic, kept verbatim
/// from the contract: content negotiation happens only after a URL match,
/// and short hints can false-positive on unrelated path segments (e.g.
/// `waitfor=on` matches `https://api.online/…`). Do not tighten it.
pub fn url_matches(url: &str, hint: &str) -> bool {
    let needle = format!(".{hint}");
    url.contains(&needle) || url.ends_with(&needle)
}

/// Decode a response body: parsed JSON when the content-type contains
/// `json`, raw text otherwise. A parse failure is the caller's soft miss.
pub fn decode_body(content_type: &str, raw: &str) -> Result<Value, serde_json::Error> {
    if content_type.contains("json") {
        serde_json::from_str(raw)
    } else {
        Ok(Value::String(raw.to_string()))
    }
}

/// First-write-wins slot for the matching response.
///
/// Single-assignment-if-empty: the first qualifying response is retained,
/// later fills are ignored by design. Adequate without a compare-and-set
/// retry loop because `OnceLock::set` already arbitrates concurrent writers.
#[derive(Clone, Default)]
pub struct MatchSlot {
    inner: Arc<OnceLock<ObservedResponse>>,
}

impl MatchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the response if the slot is still empty. Returns whether this
    /// call won the slot.
    pub fn fill(&self, response: ObservedResponse) -> bool {
        self.inner.set(response).is_ok()
    }

    pub fn get(&self) -> Option<ObservedResponse> {
        self.inner.get().cloned()
    }
}

/// Result of offering one observed response to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Matched, decoded, and won the slot.
    Filled,
    /// Matched and decoded, but a match was already recorded.
    AlreadyFilled,
    /// URL did not match the hint.
    NoMatch,
    /// URL matched but the body could not be decoded; keep waiting.
    SoftMiss,
}

/// Observer half of a capture, handed to the session before navigation.
///
/// The engine feeds every observed response through [`ResponseSink::offer`];
/// the capture loop watches the slot. Cloneable so the engine can move it
/// into its event task.
#[derive(Clone)]
pub struct ResponseSink {
    capture_id: String,
    target: String,
    hint: String,
    slot: MatchSlot,
    bus: Option<Arc<EventBus>>,
}

impl ResponseSink {
    pub fn new(
        capture_id: String,
        target: String,
        hint: String,
        slot: MatchSlot,
        bus: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            capture_id,
            target,
            hint,
            slot,
            bus,
        }
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Cheap pre-filter so engines can skip body retrieval for
    /// non-matching URLs.
    pub fn matches(&self, url: &str) -> bool {
        url_matches(url, &self.hint)
    }

    /// Offer one observed response. Matching, decoding, and the
    /// first-write-wins arbitration all happen here.
    pub fn offer(
        &self,
        url: &str,
        status: u16,
        headers: HashMap<String, String>,
        content_type: &str,
        raw_body: &str,
    ) -> Offer {
        if !self.matches(url) {
            return Offer::NoMatch;
        }
        match decode_body(content_type, raw_body) {
            Ok(body) => {
                let response = ObservedResponse {
                    url: url.to_string(),
                    status,
                    headers,
                    body,
                };
                if self.slot.fill(response) {
                    debug!(url, status, "response matched");
                    self.emit(CaptureEvent::ResponseMatched {
                        capture_id: self.capture_id.clone(),
                        target: self.target.clone(),
                        url: url.to_string(),
                        status,
                    });
                    Offer::Filled
                } else {
                    Offer::AlreadyFilled
                }
            }
            Err(e) => {
                self.soft_miss(url, &e.to_string());
                Offer::SoftMiss
            }
        }
    }

    /// Record a matching response whose body could not be extracted.
    /// Engines call this directly when body retrieval itself fails.
    pub fn soft_miss(&self, url: &str, reason: &str) {
        debug!(url, reason, "matching response discarded, still waiting");
        self.emit(CaptureEvent::ExtractionSoftMiss {
            capture_id: self.capture_id.clone(),
            target: self.target.clone(),
            url: url.to_string(),
            reason: reason.to_string(),
        });
    }

    fn emit(&self, event: CaptureEvent) {
        if let Some(bus) = &self.bus {
            bus.emit(event);
        }
    }
}

/// Run one capture attempt against `engine`.
///
/// Exactly one [`CaptureOutcome`] is produced, and the session used to
/// produce it is released before this returns, on success, not-found,
/// and failure alike. Errors never propagate past this function; they
/// become `Failed` carrying the [`CaptureError`] for the adapter to map.
pub async fn capture(
    engine: &dyn BrowserEngine,
    request: &CaptureRequest,
    config: &CaptureConfig,
    bus: Option<Arc<EventBus>>,
) -> CaptureOutcome {
    let capture_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    info!(
        %capture_id,
        target = %request.target_url,
        hint = %request.match_hint,
        "capture started"
    );
    if let Some(bus) = &bus {
        bus.emit(CaptureEvent::CaptureStarted {
            capture_id: capture_id.clone(),
            target: request.target_url.clone(),
            hint: request.match_hint.clone(),
            timestamp: events::now_timestamp(),
        });
    }

    let outcome = match engine.new_session().await {
        Ok(mut session) => {
            let slot = MatchSlot::new();
            let sink = ResponseSink::new(
                capture_id.clone(),
                request.target_url.clone(),
                request.match_hint.clone(),
                slot.clone(),
                bus.clone(),
            );
            let outcome = drive(session.as_mut(), request, config, &slot, sink, &bus, &capture_id, started).await;
            // Release the session on every path before reporting the outcome
            if let Err(e) = session.close().await {
                warn!(%capture_id, "session close failed: {e:#}");
            }
            outcome
        }
        Err(e) => CaptureOutcome::Failed(CaptureError::Unexpected(format!(
            "browser session unavailable: {e:#}"
        ))),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(%capture_id, outcome = outcome.kind(), elapsed_ms, "capture finished");
    if let Some(bus) = &bus {
        bus.emit(CaptureEvent::CaptureFinished {
            capture_id,
            target: request.target_url.clone(),
            outcome: outcome.kind().to_string(),
            elapsed_ms,
        });
    }
    outcome
}

/// Observe, navigate, poll. The caller owns session release.
#[allow(clippy::too_many_arguments)]
async fn drive(
    session: &mut dyn BrowserSession,
    request: &CaptureRequest,
    config: &CaptureConfig,
    slot: &MatchSlot,
    sink: ResponseSink,
    bus: &Option<Arc<EventBus>>,
    capture_id: &str,
    started: Instant,
) -> CaptureOutcome {
    // The observer must be attached before navigation begins, so responses
    // produced during the initial load are not missed.
    if let Err(e) = session.observe(sink).await {
        return CaptureOutcome::Failed(CaptureError::Unexpected(format!(
            "response observer failed: {e:#}"
        )));
    }

    if let Err(e) = session
        .navigate(&request.target_url, config.navigation_timeout_ms)
        .await
    {
        return CaptureOutcome::Failed(CaptureError::Navigation(format!("{e:#}")));
    }
    if let Some(bus) = bus {
        bus.emit(CaptureEvent::NavigationComplete {
            capture_id: capture_id.to_string(),
            target: request.target_url.clone(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }

    // Response observation is asynchronous relative to this loop: wait
    // cooperatively for the slot to fill, bounded by the poll budget.
    for _ in 0..config.max_poll_attempts {
        if let Some(found) = slot.get() {
            return CaptureOutcome::Found(found);
        }
        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
    match slot.get() {
        Some(found) => CaptureOutcome::Found(found),
        None => CaptureOutcome::NotFound,
    }
}
