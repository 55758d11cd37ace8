//! # embedcache-client
//!
//! Pluggable embedding service used by the batch engine.
//!
//! - `ApiEmbedder`: OpenAI-compatible `/embeddings` endpoint over HTTP
//! - `MockEmbedder`: deterministic in-process vectors for tests
//!
//! A client performs exactly one request per `embed` call. Retries, pacing
//! and checkpointing belong to the caller.

mod api;
mod mock;

pub use api::{ApiEmbedder, ApiEmbedderConfig};
pub use mock::MockEmbedder;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for a single embedding request.
///
/// Every variant is transient from the engine's point of view.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Embedding count mismatch: requested {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Remote embedding service.
///
/// Implementations return one vector per input text, in request order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier the vectors come from.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts with a single request.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError>;
}
