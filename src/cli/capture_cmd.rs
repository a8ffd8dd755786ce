//! One-shot capture from the command line.

use crate::capture::{self, CaptureConfig, CaptureOutcome, CaptureRequest};
use crate::cli::output;
use crate::engine::chromium::ChromiumEngine;
use crate::engine::BrowserEngine;
use crate::error::CaptureError;
use anyhow::{bail, Context, Result};

pub async fn run(
    url: &str,
    waitfor: &str,
    timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_attempts: Option<u32>,
) -> Result<()> {
    crate::cli::init_tracing();

    if url.is_empty() || waitfor.is_empty() {
        bail!(CaptureError::MissingParameter);
    }

    let mut config = CaptureConfig::from_env();
    if let Some(ms) = timeout_ms {
        config.navigation_timeout_ms = if ms == 0 { None } else { Some(ms) };
    }
    if let Some(ms) = poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(n) = max_attempts {
        config.max_poll_attempts = n;
    }

    let engine = ChromiumEngine::new()
        .await
        .context("failed to initialize Chromium engine")?;

    let request = CaptureRequest::new(url, waitfor);
    let outcome = capture::capture(&engine, &request, &config, None).await;
    engine.shutdown().await?;

    match outcome {
        CaptureOutcome::Found(response) => {
            if output::is_json() {
                output::print_json(&serde_json::to_value(&response)?);
            } else {
                println!("url:     {}", response.url);
                println!("status:  {}", response.status);
                println!(
                    "headers: {}",
                    serde_json::to_string_pretty(&response.headers)?
                );
                println!("body:    {}", serde_json::to_string_pretty(&response.body)?);
            }
            Ok(())
        }
        CaptureOutcome::NotFound => bail!(CaptureError::NotFound {
            hint: waitfor.to_string()
        }),
        CaptureOutcome::Failed(error) => bail!(error),
    }
}
