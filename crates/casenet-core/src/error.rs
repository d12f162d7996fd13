//! Centralized error types for the network pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for graph construction, analysis and export.
#[derive(Error, Debug)]
pub enum CasenetError {
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input in {}: {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Centrality computation failed: {0}")]
    Centrality(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type CasenetResult<T> = Result<T, CasenetError>;

impl CasenetError {
    /// Create an invalid input error for `path`.
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a record store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}
