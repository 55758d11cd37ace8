//! End-to-end test infrastructure for embedcache.
//!
//! Provides a shared TestHarness that owns a temp directory with input, cache
//! and output paths, plus helpers to write input tables and read results back.

use std::path::PathBuf;

use embedcache_store::EmbeddingCache;
use embedcache_types::Settings;

/// Header used for every harness input table.
pub const INPUT_HEADERS: [&str; 3] = ["pair_id", "need_description", "academic_resource_description"];

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Settings pointing at the temp dir, no pacing
    pub settings: Settings,
}

impl TestHarness {
    /// Create a harness with batch size 1 and zero pacing.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path();

        let mut settings = Settings::default();
        settings.input_path = dir.join("from_db.csv").display().to_string();
        settings.cache_path = dir.join("embeddings_cache.msgpack").display().to_string();
        settings.output_path = dir.join("pairs_with_embeddings.csv").display().to_string();
        settings.batch.batch_size = 1;
        settings.batch.pacing_ms = 0;

        Self {
            _temp_dir: temp_dir,
            settings,
        }
    }

    pub fn input_path(&self) -> PathBuf {
        self.settings.input_path()
    }

    pub fn cache_path(&self) -> PathBuf {
        self.settings.cache_path()
    }

    pub fn output_path(&self) -> PathBuf {
        self.settings.output_path()
    }

    /// Write an input table of (need, resource) pairs with a numeric id column.
    pub fn write_input(&self, pairs: &[(&str, &str)]) {
        let mut writer =
            csv::Writer::from_path(self.input_path()).expect("Failed to create input table");
        writer
            .write_record(INPUT_HEADERS)
            .expect("Failed to write header");
        for (i, (need, resource)) in pairs.iter().enumerate() {
            writer
                .write_record([i.to_string().as_str(), *need, *resource])
                .expect("Failed to write row");
        }
        writer.flush().expect("Failed to flush input table");
    }

    /// Read the output table as (headers, rows).
    pub fn read_output(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader =
            csv::Reader::from_path(self.output_path()).expect("Failed to open output table");
        let headers = reader
            .headers()
            .expect("Failed to read output header")
            .iter()
            .map(String::from)
            .collect();
        let rows = reader
            .records()
            .map(|r| {
                r.expect("Failed to read output row")
                    .iter()
                    .map(String::from)
                    .collect()
            })
            .collect();
        (headers, rows)
    }

    /// Load the cache file as the pipeline would.
    pub fn load_cache(&self) -> EmbeddingCache {
        EmbeddingCache::load(self.cache_path()).expect("Failed to load cache")
    }

    /// Raw bytes of the cache file.
    pub fn cache_bytes(&self) -> Vec<u8> {
        std::fs::read(self.cache_path()).expect("Failed to read cache file")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a slice of output cells as floats.
pub fn parse_floats(cells: &[String]) -> Vec<f32> {
    cells
        .iter()
        .map(|c| c.parse().expect("Output cell is not a float"))
        .collect()
}
