//! Batch request engine.
//!
//! Turns the pending queue into cache entries: fixed-size batches, bounded
//! retry with exponential backoff, pacing between batches, and periodic
//! checkpoints of the cache. A batch that exhausts its retries flushes the
//! cache before the run aborts, so earlier batches are never lost.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tracing::{error, info, warn};

use embedcache_client::{Embedder, EmbedderError};
use embedcache_store::EmbeddingCache;
use embedcache_types::BatchSettings;

use crate::error::PipelineError;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Texts per request
    pub batch_size: usize,
    /// Successful batches between checkpoints
    pub save_every: usize,
    /// Delay between consecutive batches
    pub pacing: Duration,
    /// Attempts per batch, counted from 1
    pub max_retries: u32,
    /// Backoff base: the wait after attempt n is `retry_backoff^(n-1)` seconds
    pub retry_backoff: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&BatchSettings::default())
    }
}

impl From<&BatchSettings> for EngineConfig {
    fn from(settings: &BatchSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            save_every: settings.save_every.max(1),
            pacing: settings.pacing(),
            max_retries: settings.max_retries.max(1),
            retry_backoff: settings.retry_backoff,
        }
    }
}

impl EngineConfig {
    /// Deterministic delay schedule between attempts: 1s, b, b^2, ...
    pub fn retry_schedule(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_secs(1))
            .with_multiplier(self.retry_backoff)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(u64::from(u32::MAX)))
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Statistics from an engine run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Batches that completed successfully
    pub batches: usize,
    /// Texts embedded and stored in the cache
    pub embedded: usize,
    /// Requests issued, including failed attempts
    pub attempts: usize,
    /// Periodic checkpoints written (the final save is not counted)
    pub checkpoints: usize,
}

/// Sequential batch engine over an `Embedder`.
pub struct BatchEngine<'a, E: Embedder + ?Sized> {
    embedder: &'a E,
    config: EngineConfig,
}

impl<'a, E: Embedder + ?Sized> BatchEngine<'a, E> {
    pub fn new(embedder: &'a E, config: EngineConfig) -> Self {
        Self { embedder, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Embed every pending text into `cache`.
    ///
    /// The queue is taken as given; it is not re-checked against the cache.
    /// An empty queue issues no requests and writes nothing.
    pub async fn run(
        &self,
        pending: &[String],
        cache: &mut EmbeddingCache,
    ) -> Result<EngineStats, PipelineError> {
        let mut stats = EngineStats::default();

        if pending.is_empty() {
            info!("No new texts to embed, using existing cache");
            return Ok(stats);
        }

        let batch_size = self.config.batch_size.max(1);
        let save_every = self.config.save_every.max(1);
        let total_batches = pending.len().div_ceil(batch_size);
        info!(
            pending = pending.len(),
            batches = total_batches,
            batch_size,
            model = self.embedder.model_id(),
            "Requesting embeddings"
        );

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            if index > 0 && !self.config.pacing.is_zero() {
                tokio::time::sleep(self.config.pacing).await;
            }

            let vectors = match self
                .embed_with_retry(index, batch, cache.dimension(), &mut stats)
                .await
            {
                Ok(vectors) => vectors,
                Err(e) => {
                    error!(batch = index, error = %e, "Fatal error getting embeddings");
                    flush_before_abort(cache);
                    return Err(e);
                }
            };

            for (text, vector) in batch.iter().zip(vectors) {
                if let Err(e) = cache.put(text, vector) {
                    error!(batch = index, error = %e, "Rejected embedding from service");
                    flush_before_abort(cache);
                    return Err(e.into());
                }
            }

            stats.batches += 1;
            stats.embedded += batch.len();
            info!(
                batch = index + 1,
                of = total_batches,
                cache_size = cache.len(),
                "Batch complete"
            );

            if stats.batches % save_every == 0 {
                cache.save()?;
                stats.checkpoints += 1;
                info!(
                    batches = stats.batches,
                    of = total_batches,
                    cache_size = cache.len(),
                    "Saved cache checkpoint"
                );
            }
        }

        cache.save()?;
        info!(
            batches = stats.batches,
            attempts = stats.attempts,
            cache_size = cache.len(),
            "All batches done"
        );

        Ok(stats)
    }

    /// Request one batch, retrying failures up to `max_retries` attempts.
    async fn embed_with_retry(
        &self,
        index: usize,
        batch: &[String],
        dimension: Option<usize>,
        stats: &mut EngineStats,
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let max_retries = self.config.max_retries.max(1);
        let mut schedule = self.config.retry_schedule();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            stats.attempts += 1;

            let result = self
                .embedder
                .embed(batch)
                .await
                .and_then(|vectors| check_response(batch.len(), dimension, vectors));

            let err = match result {
                Ok(vectors) => return Ok(vectors),
                Err(e) => e,
            };

            if attempt >= max_retries {
                return Err(PipelineError::BatchExhausted {
                    batch: index,
                    attempts: attempt,
                    source: err,
                });
            }

            let wait = schedule
                .next_backoff()
                .unwrap_or_else(|| Duration::from_secs(1));
            warn!(
                batch = index,
                attempt,
                max_retries,
                error = %err,
                retry_in_ms = wait.as_millis() as u64,
                "Embedding request failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Validate a response before any of it reaches the cache.
fn check_response(
    expected: usize,
    dimension: Option<usize>,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    if vectors.len() != expected {
        return Err(EmbedderError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }

    let Some(first) = vectors.first() else {
        return Ok(vectors);
    };
    let want = dimension.unwrap_or(first.len());
    if want == 0 {
        return Err(EmbedderError::ParseError("empty embedding vector".to_string()));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != want) {
        return Err(EmbedderError::DimensionMismatch {
            expected: want,
            actual: bad.len(),
        });
    }

    Ok(vectors)
}

fn flush_before_abort(cache: &EmbeddingCache) {
    match cache.save() {
        Ok(()) => info!(cache_size = cache.len(), "Saved cache before aborting"),
        Err(e) => error!(error = %e, "Failed to save cache before aborting"),
    }
}
