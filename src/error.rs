use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading, validating or writing a model file.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress {format} model data: {source}")]
    Decompress {
        format: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("model document json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model order n must be at least 2, got {0}")]
    InvalidOrder(usize),

    #[error("smoothing alpha must be a positive finite number, got {0}")]
    InvalidAlpha(f64),

    #[error("failed to write model file: {0}")]
    Write(#[from] std::io::Error),
}

/// Failures while saving or restoring a session snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("snapshot was written by an unsupported format version {0}")]
    UnsupportedVersion(u32),
}
