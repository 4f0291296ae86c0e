use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single subscription record could not be analysed.
///
/// These never abort a batch; they are collected into the report.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordError {
    /// One or more fields required for cost computation are absent.
    #[error("Incomplete record: missing {}", .missing.join(", "))]
    Incomplete { missing: Vec<String> },

    /// A field holds a value outside its domain (negative amount, bad date).
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// The billing cycle collapsed to zero or fewer days.
    #[error("Zero-length billing cycle for due date {due_date}")]
    ZeroCycleLength { due_date: DateTime<Utc> },
}

impl RecordError {
    /// Shorthand for an [`RecordError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RecordError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A notification or reporting sink refused a call.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink rejected the payload.
    #[error("Sink rejected payload: {0}")]
    Rejected(String),

    /// Writing to the sink's underlying file or stream failed.
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload could not be serialised.
    #[error("Sink serialisation error: {0}")]
    Json(#[from] serde_json::Error),
}

/// All errors produced by the subtrack crates.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// The configured data file or directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// A data directory contained no subscription files.
    #[error("No subscription files found in {0}")]
    NoDataFiles(PathBuf),

    /// The record collection could not be obtained.
    #[error("Record source failed: {0}")]
    Source(String),

    /// The reporting sink rejected the finished report.
    #[error("Failed to deliver report: {0}")]
    Report(#[source] SinkError),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the subtrack crates.
pub type Result<T> = std::result::Result<T, TrackerError>;
