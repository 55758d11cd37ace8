//! # embedcache-store
//!
//! Durable embedding cache keyed by normalized text.
//!
//! The cache is loaded once at startup, mutated in memory by the batch engine
//! and persisted with a write-temp-then-rename so the canonical file is always
//! either the previous or the new complete snapshot.

pub mod cache;
pub mod error;

pub use cache::{normalize, tmp_path_for, EmbeddingCache, CACHE_FORMAT_VERSION};
pub use error::CacheError;
