use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors: any of these aborts the whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scan worker stopped unexpectedly")]
    WorkerLost,

    #[error("Operation cancelled")]
    Cancelled,
}

/// Per-image failure while decoding or hashing. The image is skipped.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A flagged file that could not be removed.
#[derive(Debug, Error)]
#[error("Failed to delete {}: {error}", path.display())]
pub struct DeleteFailure {
    pub path: PathBuf,
    #[source]
    pub error: std::io::Error,
}
