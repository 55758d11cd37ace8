//! Pipeline orchestration: table in, cache filled, table out.

use tracing::info;

use embedcache_client::Embedder;
use embedcache_store::EmbeddingCache;
use embedcache_types::Settings;

use crate::engine::{BatchEngine, EngineConfig, EngineStats};
use crate::error::PipelineError;
use crate::mapper::{map_rows, MappedTable, MappingConfig};
use crate::normalize::{pending_texts, unique_texts};
use crate::table::Table;

/// Outcome of the embedding phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedReport {
    pub unique_texts: usize,
    pub pending: usize,
    pub engine: EngineStats,
    pub cache_size: usize,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub unique_texts: usize,
    pub pending: usize,
    pub engine: EngineStats,
    pub cache_size: usize,
    /// Rows written to the output table
    pub rows: usize,
    /// Non-empty texts zero-filled at mapping
    pub missing: usize,
}

/// Embed every uncached text of `table` into `cache`.
pub async fn embed_table<E: Embedder + ?Sized>(
    table: &Table,
    settings: &Settings,
    cache: &mut EmbeddingCache,
    embedder: &E,
) -> Result<EmbedReport, PipelineError> {
    let unique = unique_texts(table, &settings.need_column, &settings.resource_column)?;
    let pending = pending_texts(&unique, cache);
    info!(
        unique = unique.len(),
        cached = unique.len() - pending.len(),
        pending = pending.len(),
        "Deduplicated input texts"
    );

    let engine = BatchEngine::new(embedder, EngineConfig::from(&settings.batch));
    let stats = engine.run(&pending, cache).await?;

    Ok(EmbedReport {
        unique_texts: unique.len(),
        pending: pending.len(),
        engine: stats,
        cache_size: cache.len(),
    })
}

/// Attach cached vectors to the rows of `table`.
pub fn map_table(
    table: &Table,
    settings: &Settings,
    cache: &EmbeddingCache,
) -> Result<MappedTable, PipelineError> {
    let mapped = map_rows(table, cache, &MappingConfig::from_settings(settings))?;
    info!(
        rows = mapped.len(),
        dimension = mapped.dimension(),
        missing = mapped.missing(),
        "Mapped embeddings onto rows"
    );
    Ok(mapped)
}

/// Full run: read input, load cache, embed misses, map, write output.
pub async fn run_pipeline<E: Embedder + ?Sized>(
    settings: &Settings,
    embedder: &E,
) -> Result<RunReport, PipelineError> {
    let table = Table::read_csv(&settings.input_path())?;
    run_on_table(&table, settings, embedder).await
}

/// Full run over an already loaded input table.
pub async fn run_on_table<E: Embedder + ?Sized>(
    table: &Table,
    settings: &Settings,
    embedder: &E,
) -> Result<RunReport, PipelineError> {
    let mut cache = EmbeddingCache::load(settings.cache_path())?;

    let embedded = embed_table(table, settings, &mut cache, embedder).await?;
    let mapped = map_table(table, settings, &cache)?;
    mapped.write_csv(&settings.output_path())?;

    let report = RunReport {
        unique_texts: embedded.unique_texts,
        pending: embedded.pending,
        engine: embedded.engine,
        cache_size: embedded.cache_size,
        rows: mapped.len(),
        missing: mapped.missing(),
    };
    info!(
        rows = report.rows,
        cache_size = report.cache_size,
        missing = report.missing,
        output = ?settings.output_path(),
        "Pipeline finished"
    );
    Ok(report)
}
