//! Scripted browser engine for exercising capture flows without Chromium.
//!
//! Each session replays the engine's scripted responses after navigation,
//! each on its own delay, and counts `close` calls so tests can assert
//! the release-exactly-once invariant for every outcome kind.

use super::{BrowserEngine, BrowserSession};
use crate::capture::ResponseSink;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted network response, emitted `delay_ms` after navigation.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
    pub delay_ms: u64,
}

impl ScriptedResponse {
    pub fn json(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            status: 200,
            content_type: "application/json".to_string(),
            body: body.to_string(),
            delay_ms: 0,
        }
    }

    pub fn text(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            status: 200,
            content_type: "text/plain".to_string(),
            body: body.to_string(),
            delay_ms: 0,
        }
    }

    pub fn after(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Scripted engine. Sessions share the engine's response script.
#[derive(Default)]
pub struct MockEngine {
    responses: Vec<ScriptedResponse>,
    session_failure: Option<String>,
    navigation_failure: Option<String>,
    active_count: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
}

impl MockEngine {
    /// An engine whose pages produce no network responses at all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses,
            ..Self::default()
        }
    }

    /// Every `new_session` call fails, as when the browser cannot launch.
    pub fn failing_session(reason: &str) -> Self {
        Self {
            session_failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Sessions open, but navigation fails (DNS error, refused, timeout).
    pub fn failing_navigation(reason: &str) -> Self {
        Self {
            navigation_failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Total `close` calls across all sessions this engine created.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>> {
        if let Some(reason) = &self.session_failure {
            bail!("{reason}");
        }
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockSession {
            responses: self.responses.clone(),
            navigation_failure: self.navigation_failure.clone(),
            sink: None,
            active_count: Arc::clone(&self.active_count),
            close_calls: Arc::clone(&self.close_calls),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

struct MockSession {
    responses: Vec<ScriptedResponse>,
    navigation_failure: Option<String>,
    sink: Option<ResponseSink>,
    active_count: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn observe(&mut self, sink: ResponseSink) -> Result<()> {
        self.sink = Some(sink);
        Ok(())
    }

    async fn navigate(&mut self, _url: &str, _timeout_ms: Option<u64>) -> Result<()> {
        if let Some(reason) = &self.navigation_failure {
            bail!("{reason}");
        }
        // Replay the script as if the page issued these requests itself.
        // Responses arriving before `observe` was called are dropped, which
        // is exactly the race the observe-before-navigate rule prevents.
        if let Some(sink) = &self.sink {
            for scripted in self.responses.clone() {
                let sink = sink.clone();
                tokio::spawn(async move {
                    if scripted.delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(scripted.delay_ms)).await;
                    }
                    let mut headers = HashMap::new();
                    headers.insert("content-type".to_string(), scripted.content_type.clone());
                    sink.offer(
                        &scripted.url,
                        scripted.status,
                        headers,
                        &scripted.content_type,
                        &scripted.body,
                    );
                });
            }
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
