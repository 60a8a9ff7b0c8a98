//! Domain-specific error types for the Firefly engine.
//!
//! Fallible operations return `Result<T, FireflyError>`. The scan path
//! itself never fails: degenerate geometry falls back to fixed values and
//! streamers log transport failures instead of returning them.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the Firefly engine.
#[derive(Debug, Error)]
pub enum FireflyError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The socket or file layer reported an error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A write exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A streamer was asked to write without a destination.
    #[error("no destination configured")]
    NoDestination,

    // ── Encoding Errors ──────────────────────────────────────────
    /// Structured (bincode / json) encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A fragment header did not fit its one-byte length field.
    #[error("packet header too large: {size} bytes (max 255)")]
    HeaderTooLarge { size: usize },

    // ── Pipeline Errors ──────────────────────────────────────────
    /// A time value was sent after the pipeline was stopped.
    #[error("pipeline stopped")]
    PipelineStopped,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for FireflyError {
    fn from(s: String) -> Self {
        FireflyError::Other(s)
    }
}

impl From<&str> for FireflyError {
    fn from(s: &str) -> Self {
        FireflyError::Other(s.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for FireflyError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        FireflyError::Encoding(e.to_string())
    }
}

impl From<serde_json::Error> for FireflyError {
    fn from(e: serde_json::Error) -> Self {
        FireflyError::Encoding(e.to_string())
    }
}
