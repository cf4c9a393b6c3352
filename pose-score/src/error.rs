//! Error types for pose scoring.

use std::path::PathBuf;

/// Result alias for pose scoring operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Errors produced while building the reference pose or scoring a frame.
#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    /// The reference image could not be opened or decoded.
    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The detector reported no landmarks for the reference image.
    #[error("No pose landmarks detected in {0}")]
    Detection(String),

    /// Live and reference shapes disagree, or an angle triple points past the
    /// end of the landmark set. Indicates a detector topology change that the
    /// angle triples were not updated for.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PoseError {
    /// Fail unless `actual == expected`.
    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(PoseError::ShapeMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}

/// Errors from session lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A session is already capturing; its result has not been produced yet.
    #[error("A session is already running")]
    SessionAlreadyRunning,
}
