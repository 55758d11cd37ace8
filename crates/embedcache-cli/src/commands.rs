//! Command implementations.

use anyhow::{Context, Result};
use tracing::info;

use embedcache_client::{ApiEmbedder, ApiEmbedderConfig};
use embedcache_pipeline::{embed_table, map_table, run_on_table, Table};
use embedcache_store::EmbeddingCache;
use embedcache_types::Settings;

use crate::cli::{BatchArgs, PathArgs};

/// Load layered settings, apply CLI overrides, and validate.
pub fn load_settings(
    config_path: Option<&str>,
    log_level: Option<&str>,
    paths: &PathArgs,
    batch: &BatchArgs,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    apply_overrides(&mut settings, log_level, paths, batch);
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

fn apply_overrides(
    settings: &mut Settings,
    log_level: Option<&str>,
    paths: &PathArgs,
    batch: &BatchArgs,
) {
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    if let Some(input) = &paths.input {
        settings.input_path = input.clone();
    }
    if let Some(cache) = &paths.cache {
        settings.cache_path = cache.clone();
    }
    if let Some(output) = &paths.output {
        settings.output_path = output.clone();
    }
    if let Some(model) = &batch.model {
        settings.embedding.model = model.clone();
    }
    if let Some(size) = batch.batch_size {
        settings.batch.batch_size = size;
    }
    if let Some(retries) = batch.max_retries {
        settings.batch.max_retries = retries;
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the setting.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn api_embedder(settings: &Settings) -> Result<ApiEmbedder> {
    let config = ApiEmbedderConfig::from_settings(&settings.embedding)
        .context("Set OPENAI_API_KEY or embedding.api_key")?;
    let embedder = ApiEmbedder::new(config).context("Failed to build embedding client")?;
    Ok(embedder)
}

/// Full pipeline against the configured embedding service.
pub async fn run_command(settings: &Settings) -> Result<()> {
    let table = Table::read_csv(&settings.input_path()).context("Failed to read input table")?;
    let embedder = api_embedder(settings)?;
    info!(model = %settings.embedding.model, "Starting embedding run");

    let report = run_on_table(&table, settings, &embedder)
        .await
        .context("Embedding pipeline aborted")?;

    println!("Unique texts:     {}", report.unique_texts);
    println!("Newly embedded:   {}", report.engine.embedded);
    println!("Cache entries:    {}", report.cache_size);
    println!("Rows written:     {}", report.rows);
    if report.missing > 0 {
        println!("Zero-filled:      {}", report.missing);
    }
    println!("Output:           {}", settings.output_path().display());
    Ok(())
}

/// Fill the cache without writing an output table.
pub async fn embed_command(settings: &Settings) -> Result<()> {
    let table = Table::read_csv(&settings.input_path()).context("Failed to read input table")?;
    let embedder = api_embedder(settings)?;
    let mut cache =
        EmbeddingCache::load(settings.cache_path()).context("Failed to load embedding cache")?;

    let report = embed_table(&table, settings, &mut cache, &embedder)
        .await
        .context("Embedding aborted")?;

    println!("Unique texts:     {}", report.unique_texts);
    println!("Newly embedded:   {}", report.engine.embedded);
    println!("Cache entries:    {}", report.cache_size);
    Ok(())
}

/// Write the augmented table from the existing cache only.
pub fn map_command(settings: &Settings) -> Result<()> {
    let table = Table::read_csv(&settings.input_path()).context("Failed to read input table")?;
    let cache =
        EmbeddingCache::load(settings.cache_path()).context("Failed to load embedding cache")?;

    let mapped = map_table(&table, settings, &cache).context("Mapping aborted")?;
    mapped
        .write_csv(&settings.output_path())
        .context("Failed to write output table")?;

    println!("Rows written:     {}", mapped.len());
    println!("Dimension:        {}", mapped.dimension());
    if mapped.missing() > 0 {
        println!("Zero-filled:      {}", mapped.missing());
    }
    Ok(())
}

/// Print a summary of the cache file.
pub fn inspect_command(settings: &Settings) -> Result<()> {
    let cache =
        EmbeddingCache::load(settings.cache_path()).context("Failed to load embedding cache")?;

    println!("Cache:            {}", cache.path().display());
    println!("Entries:          {}", cache.len());
    match cache.dimension() {
        Some(dim) => println!("Dimension:        {dim}"),
        None => println!("Dimension:        (empty cache)"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedcache_pipeline::PipelineError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_take_precedence() {
        let mut settings = Settings::default();
        let paths = PathArgs {
            input: Some("rows.csv".to_string()),
            cache: None,
            output: Some("out.csv".to_string()),
        };
        let batch = BatchArgs {
            model: None,
            batch_size: Some(8),
            max_retries: Some(2),
        };

        apply_overrides(&mut settings, Some("debug"), &paths, &batch);

        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.input_path, "rows.csv");
        assert_eq!(settings.cache_path, Settings::default().cache_path);
        assert_eq!(settings.output_path, "out.csv");
        assert_eq!(settings.batch.batch_size, 8);
        assert_eq!(settings.batch.max_retries, 2);
    }

    #[test]
    fn test_map_command_writes_output() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.input_path = temp.path().join("in.csv").display().to_string();
        settings.cache_path = temp.path().join("cache.msgpack").display().to_string();
        settings.output_path = temp.path().join("out.csv").display().to_string();

        fs::write(
            settings.input_path(),
            "need_description,academic_resource_description\nx,\n",
        )
        .unwrap();
        let mut cache = EmbeddingCache::new(settings.cache_path());
        cache.put("x", vec![1.0, 2.0]).unwrap();
        cache.save().unwrap();

        map_command(&settings).unwrap();

        let out = fs::read_to_string(settings.output_path()).unwrap();
        assert!(out.contains("x,,1,2,0,0"));
    }

    #[test]
    fn test_map_command_empty_cache_fails() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.input_path = temp.path().join("in.csv").display().to_string();
        settings.cache_path = temp.path().join("cache.msgpack").display().to_string();
        fs::write(
            settings.input_path(),
            "need_description,academic_resource_description\nx,y\n",
        )
        .unwrap();

        assert!(map_command(&settings).is_err());
    }

    #[tokio::test]
    async fn test_missing_input_reported_before_credential() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.input_path = temp.path().join("absent.csv").display().to_string();
        settings.cache_path = temp.path().join("cache.msgpack").display().to_string();
        settings.embedding.api_key = None;

        for result in [
            run_command(&settings).await,
            embed_command(&settings).await,
        ] {
            let err = result.unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<PipelineError>(),
                    Some(PipelineError::InputMissing(_))
                ),
                "unexpected error: {err:#}"
            );
        }
    }

    #[test]
    fn test_inspect_missing_cache_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.cache_path = temp.path().join("none.msgpack").display().to_string();
        assert!(inspect_command(&settings).is_ok());
    }
}
