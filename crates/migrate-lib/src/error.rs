//! Error types for `migrate-lib`.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    // === Row-level transformation errors ===
    /// A cell value failed its column transformer. Fatal for the run:
    /// a silently-skipped row is a silent data-loss bug.
    #[error("Row {row}, column '{column}': {reason}")]
    RowParse {
        row: usize,
        column: String,
        reason: String,
    },

    /// The export file is missing a column required for the requested operation.
    #[error("Export is missing required column: {column}")]
    MissingColumn { column: String },

    // === Mapping table errors ===
    /// A mapping CSV could not be parsed.
    #[error("Malformed mapping file {}: {reason}", .path.display())]
    MalformedMapping { path: PathBuf, reason: String },

    // === Configuration errors ===
    /// Configuration error, reported before any API call is attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    // === API errors ===
    /// The Shortcut API returned a non-2xx response.
    #[error("HTTP {status} from {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    /// The API response did not have the expected shape.
    #[error("Unexpected API response from {url}: {reason}")]
    ApiShape { url: String, reason: String },

    /// Transport-level failure (DNS, TLS, connect, read).
    #[error("Transport error calling {url}: {reason}")]
    Transport { url: String, reason: String },

    // === Rate limiting ===
    /// The rate limiter would have to block longer than its bounded maximum.
    #[error("Rate limit wait of {needed_ms}ms exceeds the {max_ms}ms cap")]
    RateLimitExceeded { needed_ms: u64, max_ms: u64 },

    // === Manifest errors ===
    /// A manifest row could not be parsed.
    #[error("Manifest {}: row {row}: {reason}", .path.display())]
    ManifestParse {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    /// File not found at the specified path.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    #[must_use]
    pub fn row_parse(row: usize, column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RowParse {
            row,
            column: column.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}

/// Result type using `MigrateError`.
pub type Result<T> = std::result::Result<T, MigrateError>;
