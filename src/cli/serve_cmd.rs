//! Run the netsieve HTTP server.

use crate::capture::CaptureConfig;
use crate::cli::output::{self, Styled};
use crate::engine::chromium::ChromiumEngine;
use crate::engine::{BrowserEngine, NoopEngine};
use crate::events::CaptureEvent;
use crate::rest::{self, SharedState};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Default listening port when neither `--port` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 3001;

/// Port precedence: `--port` flag, then the `PORT` env variable, then the
/// default.
pub fn resolve_port(flag: Option<u16>) -> u16 {
    flag.or_else(|| std::env::var("PORT").ok().and_then(|p| p.trim().parse().ok()))
        .unwrap_or(DEFAULT_PORT)
}

/// Start the server: initialize the engine, bind the port, serve requests.
pub async fn run(port_flag: Option<u16>) -> Result<()> {
    crate::cli::init_tracing();

    let port = resolve_port(port_flag);
    let config = CaptureConfig::from_env();

    info!("starting netsieve v{}", env!("CARGO_PKG_VERSION"));

    let s = Styled::new();
    let engine: Arc<dyn BrowserEngine> = match ChromiumEngine::new().await {
        Ok(engine) => {
            info!("Chromium engine initialized");
            Arc::new(engine)
        }
        Err(e) => {
            warn!("failed to initialize Chromium: {e:#}");
            warn!("serving in degraded mode — scrape requests will fail until Chromium is available");
            if !output::is_quiet() {
                eprintln!(
                    "  {} Chromium unavailable; serving in degraded mode (run `netsieve doctor`)",
                    s.warn_sym()
                );
            }
            Arc::new(NoopEngine)
        }
    };

    let state = Arc::new(SharedState::new(engine, config));
    state.event_bus.emit(CaptureEvent::RuntimeStarted {
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: Some(port),
    });

    if !output::is_quiet() {
        eprintln!(
            "  {} netsieve v{} listening on port {port}",
            s.ok_sym(),
            env!("CARGO_PKG_VERSION")
        );
    }

    rest::start(port, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_port_flag_wins() {
        assert_eq!(resolve_port(Some(8080)), 8080);
    }

    #[test]
    fn test_resolve_port_default() {
        // PORT is unset in the test environment
        if std::env::var("PORT").is_err() {
            assert_eq!(resolve_port(None), DEFAULT_PORT);
        }
    }
}
