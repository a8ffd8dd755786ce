//! Browser engine abstraction.
//!
//! Defines the `BrowserEngine` and `BrowserSession` traits that abstract
//! over the rendering engine (currently Chromium via chromiumoxide). One
//! session is one isolated page: created for a single capture, released
//! when it ends.

pub mod chromium;
pub mod mock;

use crate::capture::ResponseSink;
use anyhow::Result;
use async_trait::async_trait;

/// A browser engine that can create browsing sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Create a fresh, isolated session (one page, no shared page state).
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>>;
    /// Shut down the engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open sessions.
    fn active_sessions(&self) -> usize;
    /// Whether this engine can actually serve captures.
    fn is_available(&self) -> bool {
        true
    }
}

/// One isolated browsing session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Register the response observer. Must be called before `navigate`
    /// so responses produced during the initial load are not missed.
    async fn observe(&mut self, sink: ResponseSink) -> Result<()>;
    /// Navigate to `url`, waiting for network activity to settle, bounded
    /// by `timeout_ms` when present.
    async fn navigate(&mut self, url: &str, timeout_ms: Option<u64>) -> Result<()>;
    /// Close this session. Abandons any in-flight engine work.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A no-op engine used when Chromium is unavailable.
///
/// The server still starts and answers health checks; scrape requests
/// fail fast with a clear message instead of hanging.
pub struct NoopEngine;

#[async_trait]
impl BrowserEngine for NoopEngine {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>> {
        Err(anyhow::anyhow!(
            "browser engine not available — run `netsieve doctor`"
        ))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_sessions(&self) -> usize {
        0
    }
    fn is_available(&self) -> bool {
        false
    }
}
