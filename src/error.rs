//! Error types for proximity-trace

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while processing a webhook delivery
#[derive(Debug, Error)]
pub enum TraceError {
    /// Structurally invalid delivery. Not retried; the delivery is rejected.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Dwell coalescing needs at least one interval to seed the first run.
    #[error("Empty interval set for traced device {mac_address}")]
    EmptyIntervalSet { mac_address: String },

    /// Report directory or file could not be created/written.
    #[error("I/O failure at {}: {source}", .path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TraceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TraceError::IoFailure {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            TraceError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            TraceError::EmptyIntervalSet { .. } => "EMPTY_INTERVAL_SET",
            TraceError::IoFailure { .. } => "IO_FAILURE",
            TraceError::InvalidTimezone(_) => "INVALID_TIMEZONE",
            TraceError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<serde_json::Error> for TraceError {
    fn from(e: serde_json::Error) -> Self {
        TraceError::MalformedPayload(e.to_string())
    }
}
