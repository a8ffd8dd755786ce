//! Chromium-based browser engine using chromiumoxide.

use super::{BrowserEngine, BrowserSession};
use crate::capture::ResponseSink;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. NETSIEVE_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("NETSIEVE_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.netsieve/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".netsieve/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".netsieve/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".netsieve/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".netsieve/chromium/chrome-linux64/chrome"),
                home.join(".netsieve/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium engine. One headless browser process, one page per session.
pub struct ChromiumEngine {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumEngine {
    /// Launch a headless Chromium instance.
    pub async fn new() -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set NETSIEVE_CHROMIUM_PATH or install Chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        // Network events are not delivered until the domain is enabled.
        page.execute(EnableParams::default())
            .await
            .context("failed to enable network events")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumSession {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser process exits when ChromiumEngine is dropped
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page session.
pub struct ChromiumSession {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn observe(&mut self, sink: ResponseSink) -> Result<()> {
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to attach response listener")?;

        let page = self.page.clone();
        // Runs until the page closes and the event stream ends.
        tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                offer_response(&page, &sink, &event).await;
            }
        });
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: Option<u64>) -> Result<()> {
        let started = Instant::now();

        // Wait for the load event after goto; both draw on the same budget,
        // as does the settle loop below.
        match timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(Duration::from_millis(ms), self.page.goto(url)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => bail!("{e}"),
                    Err(_) => bail!("timed out after {ms}ms"),
                }
                let wait = remaining_ms(ms, started, 1);
                let _ = tokio::time::timeout(
                    Duration::from_millis(wait),
                    self.page.wait_for_navigation(),
                )
                .await;
            }
            None => {
                if let Err(e) = self.page.goto(url).await {
                    bail!("{e}");
                }
                let _ = self.page.wait_for_navigation().await;
            }
        }

        let settle_budget = timeout_ms
            .map(|ms| remaining_ms(ms, started, 500))
            .unwrap_or(10_000);
        settle_network(&self.page, settle_budget).await;

        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

/// Feed one `Network.responseReceived` event to the sink.
///
/// Body retrieval failures (evicted body, detached target, binary payload
/// that is not UTF-8) are soft misses: the response is discarded and
/// observation continues.
async fn offer_response(page: &Page, sink: &ResponseSink, event: &EventResponseReceived) {
    let url = event.response.url.as_str();
    if !sink.matches(url) {
        return;
    }

    let raw = match fetch_body(page, event).await {
        Ok(raw) => raw,
        Err(e) => {
            sink.soft_miss(url, &format!("{e:#}"));
            return;
        }
    };

    let headers = lowercase_headers(event.response.headers.inner());
    let content_type = headers
        .get("content-type")
        .cloned()
        .unwrap_or_else(|| event.response.mime_type.clone());
    let status = u16::try_from(event.response.status).unwrap_or(0);

    sink.offer(url, status, headers, &content_type, &raw);
}

/// Fetch a response body over CDP, decoding the base64 wrapping Chromium
/// applies to non-text payloads.
async fn fetch_body(page: &Page, event: &EventResponseReceived) -> Result<String> {
    let result = page
        .execute(GetResponseBodyParams::new(event.request_id.clone()))
        .await
        .context("Network.getResponseBody failed")?;

    if result.base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(result.body.as_bytes())
            .context("response body is not valid base64")?;
        String::from_utf8(bytes).context("response body is not valid UTF-8")
    } else {
        Ok(result.body.clone())
    }
}

/// Milliseconds of `budget_ms` left since `started`, floored at `floor_ms`
/// so a nearly spent budget still allows a short wait.
fn remaining_ms(budget_ms: u64, started: Instant, floor_ms: u64) -> u64 {
    budget_ms
        .saturating_sub(started.elapsed().as_millis() as u64)
        .max(floor_ms)
}

/// CDP headers arrive as a JSON object with arbitrary key casing;
/// normalize names to lowercase so lookups are case-insensitive.
fn lowercase_headers(raw: &serde_json::Value) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(map) = raw.as_object() {
        for (name, value) in map {
            let value = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            headers.insert(name.to_ascii_lowercase(), value);
        }
    }
    headers
}

/// In-page settle loop: resource count stable and document complete for a
/// short window, bounded by `budget_ms`. Best-effort: a page that never
/// goes quiet just consumes the full wait.
async fn settle_network(page: &Page, budget_ms: u64) {
    let js = format!(
        r#"(async () => {{
            const budget = {budget_ms};
            const settle = 500;
            const tick = 100;
            const start = Date.now();
            let last = -1;
            let stable = 0;
            while (Date.now() - start < budget) {{
                await new Promise(r => setTimeout(r, tick));
                let count = last;
                try {{ count = performance.getEntriesByType('resource').length; }} catch (_) {{}}
                if (document.readyState === 'complete' && count === last) {{
                    stable += tick;
                    if (stable >= settle) return true;
                }} else {{
                    stable = 0;
                }}
                last = count;
            }}
            return false;
        }})()"#
    );

    match page.evaluate(js).await {
        Ok(result) => {
            if !matches!(result.into_value::<bool>(), Ok(true)) {
                debug!("network did not settle within {budget_ms}ms");
            }
        }
        Err(e) => debug!("network settle probe failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lowercase_headers() {
        let raw = json!({
            "Content-Type": "application/json",
            "X-Request-Id": "abc",
        });
        let headers = lowercase_headers(&raw);
        assert_eq!(
            headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(headers.get("x-request-id").map(String::as_str), Some("abc"));
        assert!(!headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_lowercase_headers_non_object() {
        assert!(lowercase_headers(&json!(null)).is_empty());
    }

    #[test]
    fn test_remaining_ms_fresh_budget() {
        let started = Instant::now();
        let left = remaining_ms(10_000, started, 500);
        assert!(left > 9_000 && left <= 10_000);
    }

    #[test]
    fn test_remaining_ms_spent_budget_floors() {
        let started = Instant::now() - Duration::from_millis(600);
        assert_eq!(remaining_ms(500, started, 1), 1);
        assert_eq!(remaining_ms(500, started, 500), 500);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_session_lifecycle() {
        let engine = ChromiumEngine::new().await.expect("failed to create engine");
        let mut session = engine
            .new_session()
            .await
            .expect("failed to create session");
        assert_eq!(engine.active_sessions(), 1);

        session
            .navigate("data:text/html,<h1>Hello</h1>", Some(10_000))
            .await
            .expect("navigation failed");

        session.close().await.expect("close failed");
        assert_eq!(engine.active_sessions(), 0);

        engine.shutdown().await.expect("shutdown failed");
    }
}
