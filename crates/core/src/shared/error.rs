use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the detection pipeline.
///
/// An empty detection result is not an error.
#[derive(Error, Debug)]
pub enum FaceScanError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("cannot encode image: {0}")]
    Encode(String),

    #[error("Haar cascade file not found at: {}", path.display())]
    CascadeNotFound { path: PathBuf },

    #[error("failed to load Haar cascade from {}: {reason}", path.display())]
    CascadeLoad { path: PathBuf, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
