//! Error types for checkpoint reorganization.
//!
//! Skipped runs (unknown identity, no artifacts) are not errors; they are
//! reported through the trace channel. Everything here is a real failure.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the reorganization engine.
#[derive(Debug, Error)]
pub enum ReorgError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to move {src} to {dest}: {reason}")]
    MoveFailed {
        src: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Pass aborted by fail-fast after a run failed
    #[error("Run {run} failed: {message}")]
    RunFailed { run: PathBuf, message: String },
}

/// Result type alias for reorganization operations.
pub type Result<T> = std::result::Result<T, ReorgError>;

impl ReorgError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ReorgError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an IO error with a custom message and path context.
    pub fn io_context(
        err: std::io::Error,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        ReorgError::Io {
            message: message.into(),
            path: Some(path.into()),
            source: Some(err),
        }
    }
}
