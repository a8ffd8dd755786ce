//! Error taxonomy for capture requests.
//!
//! Extraction failures are deliberately absent: a response body that fails
//! to decode is a soft miss inside the observer, not an error surfaced to
//! callers (see `capture::ResponseSink`).

use thiserror::Error;

/// Errors a capture request can surface to an adapter (HTTP or CLI).
///
/// The display strings are part of the API contract (clients match on
/// them) and must not be reworded.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// A required request parameter is absent. Never retried.
    #[error("Missing url or waitfor parameter")]
    MissingParameter,

    /// Target unreachable, timed out, or malformed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// No matching response appeared within the poll budget.
    #[error("No {hint} file found in network requests")]
    NotFound { hint: String },

    /// Engine launch/session failure or any other unexpected error.
    #[error("{0}")]
    Unexpected(String),
}

impl CaptureError {
    /// HTTP status code this error maps to at the REST boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            CaptureError::MissingParameter => 400,
            CaptureError::NotFound { .. } => 404,
            CaptureError::Navigation(_) | CaptureError::Unexpected(_) => 500,
        }
    }
}
