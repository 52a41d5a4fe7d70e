//! Error types for the handoff pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for handoff operations.
pub type HandoffResult<T> = Result<T, HandoffError>;

/// Errors that abort a handoff run.
///
/// A missing agent report is not an error; it becomes a pending placeholder.
#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Failed to read agent report {}: {source}", path.display())]
    ReadReport {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed agent report {}: {source}", path.display())]
    MalformedReport {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("JSON encoding error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {}: {source}", path.display())]
    WriteOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}
