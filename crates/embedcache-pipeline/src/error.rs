//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

use embedcache_client::EmbedderError;
use embedcache_store::CacheError;
use embedcache_types::ConfigError;

/// Fatal errors that abort a pipeline run.
///
/// Transient request failures never surface here on their own; they are
/// retried and only reported through `BatchExhausted`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input table file absent
    #[error("Input table not found: {0:?}")]
    InputMissing(PathBuf),

    /// A configured text column is not in the input header
    #[error("Column {0:?} not found in input header")]
    MissingColumn(String),

    /// A data row has more fields than the header
    #[error("Row at line {line} has {actual} fields, header has {expected}")]
    RowTooLong {
        line: u64,
        expected: usize,
        actual: usize,
    },

    /// CSV read/write error
    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache load/save/put error (includes corrupt caches)
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Settings error (includes a missing credential)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Retry budget exhausted for one batch; cache was flushed first
    #[error("Batch {batch} failed after {attempts} attempts: {source}")]
    BatchExhausted {
        batch: usize,
        attempts: u32,
        #[source]
        source: EmbedderError,
    },

    /// Mapping needs at least one cached vector to know the dimension
    #[error("No embeddings available: the cache is empty")]
    EmptyCacheAtMapping,

    /// Strict mapping found texts with no cached vector
    #[error("{count} non-empty texts have no cached embedding")]
    MissingEmbeddings { count: usize },
}
