//! Cache error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, mutating or saving the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored cache exists but cannot be trusted
    #[error("Cache file {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Vector length disagrees with the cache dimension
    #[error("Dimension mismatch for {key:?}: expected {expected}, got {actual}")]
    DimensionMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// Empty keys are never stored
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Zero-length vectors are never stored
    #[error("Empty vector for key {0:?}")]
    EmptyVector(String),

    /// Snapshot encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
}
