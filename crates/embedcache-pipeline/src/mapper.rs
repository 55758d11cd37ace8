//! Joins cached vectors back onto input rows.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use embedcache_store::{normalize, EmbeddingCache};
use embedcache_types::Settings;

use crate::error::PipelineError;
use crate::table::Table;

/// Column names and policy for the mapping step.
#[derive(Debug, Clone)]
pub struct MappingConfig {
    pub need_column: String,
    pub resource_column: String,
    /// Prefix of the need vector columns, e.g. `need_emb_0`
    pub need_prefix: String,
    /// Prefix of the resource vector columns, e.g. `res_emb_0`
    pub resource_prefix: String,
    /// Fail instead of zero-filling texts that have no cached vector
    pub strict_missing: bool,
}

impl MappingConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            need_column: settings.need_column.clone(),
            resource_column: settings.resource_column.clone(),
            need_prefix: settings.mapping.need_prefix.clone(),
            resource_prefix: settings.mapping.resource_prefix.clone(),
            strict_missing: settings.mapping.strict_missing,
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// One input row with its two vectors attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    fields: Vec<String>,
    need: Vec<f32>,
    resource: Vec<f32>,
}

impl RowRecord {
    /// Original field values, unchanged
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn need_embedding(&self) -> &[f32] {
        &self.need
    }

    pub fn resource_embedding(&self) -> &[f32] {
        &self.resource
    }
}

/// Output of `map_rows`: the input rows in order, each widened by `2 * dimension`
/// vector columns.
#[derive(Debug, Clone)]
pub struct MappedTable {
    headers: Vec<String>,
    records: Vec<RowRecord>,
    dimension: usize,
    missing: usize,
}

impl MappedTable {
    /// Original headers, then the need vector columns, then the resource ones.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[RowRecord] {
        &self.records
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Non-empty texts that were zero-filled because the cache lacked them
    pub fn missing(&self) -> usize {
        self.missing
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for record in &self.records {
            let row = record
                .fields
                .iter()
                .cloned()
                .chain(record.need.iter().map(f32::to_string))
                .chain(record.resource.iter().map(f32::to_string));
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!(path = ?path, rows = self.records.len(), columns = self.headers.len(), "Wrote output table");
        Ok(())
    }
}

/// Attach need and resource vectors to every row.
///
/// Empty (after trimming) texts get an all-zero vector. Non-empty texts with
/// no cached vector are zero-filled and counted, or rejected when
/// `strict_missing` is set.
pub fn map_rows(
    table: &Table,
    cache: &EmbeddingCache,
    config: &MappingConfig,
) -> Result<MappedTable, PipelineError> {
    let need_idx = table.column_index(&config.need_column)?;
    let res_idx = table.column_index(&config.resource_column)?;
    let dimension = cache
        .dimension()
        .filter(|_| !cache.is_empty())
        .ok_or(PipelineError::EmptyCacheAtMapping)?;

    let mut missing = 0usize;
    let mut lookup = |text: &str, side: &str| -> Vec<f32> {
        let key = normalize(text);
        if key.is_empty() {
            return vec![0.0; dimension];
        }
        match cache.get(key) {
            Some(vector) => vector.to_vec(),
            None => {
                warn!(side, text = key, "No cached embedding, using zeros");
                missing += 1;
                vec![0.0; dimension]
            }
        }
    };

    let records: Vec<RowRecord> = table
        .rows()
        .iter()
        .map(|row| RowRecord {
            need: lookup(&row[need_idx], "need"),
            resource: lookup(&row[res_idx], "resource"),
            fields: row.clone(),
        })
        .collect();

    if missing > 0 {
        if config.strict_missing {
            return Err(PipelineError::MissingEmbeddings { count: missing });
        }
        warn!(missing, "Some texts had no cached embedding and were zero-filled");
    }

    let headers = table
        .headers()
        .iter()
        .cloned()
        .chain((0..dimension).map(|i| format!("{}{i}", config.need_prefix)))
        .chain((0..dimension).map(|i| format!("{}{i}", config.resource_prefix)))
        .collect();

    Ok(MappedTable {
        headers,
        records,
        dimension,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config() -> MappingConfig {
        MappingConfig {
            need_column: "need".to_string(),
            resource_column: "res".to_string(),
            need_prefix: "need_emb_".to_string(),
            resource_prefix: "res_emb_".to_string(),
            strict_missing: false,
        }
    }

    fn table(rows: &[(&str, &str, &str)]) -> Table {
        Table::new(
            vec!["id".to_string(), "need".to_string(), "res".to_string()],
            rows.iter()
                .map(|(id, n, r)| vec![id.to_string(), n.to_string(), r.to_string()])
                .collect(),
        )
    }

    fn cache_with(dir: &TempDir, entries: &[(&str, Vec<f32>)]) -> EmbeddingCache {
        let mut cache = EmbeddingCache::new(dir.path().join("cache.msgpack"));
        for (key, vector) in entries {
            cache.put(key, vector.clone()).unwrap();
        }
        cache
    }

    #[test]
    fn test_map_rows_uses_cached_vectors() {
        let temp = TempDir::new().unwrap();
        let cache = cache_with(
            &temp,
            &[("a", vec![1.0, 2.0]), ("b", vec![3.0, 4.0])],
        );
        let t = table(&[("1", " a ", "b"), ("2", "b", "a")]);

        let mapped = map_rows(&t, &cache, &config()).unwrap();

        assert_eq!(
            mapped.headers(),
            &["id", "need", "res", "need_emb_0", "need_emb_1", "res_emb_0", "res_emb_1"]
        );
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped.dimension(), 2);
        assert_eq!(mapped.missing(), 0);
        assert_eq!(mapped.records()[0].fields(), &["1", " a ", "b"]);
        assert_eq!(mapped.records()[0].need_embedding(), &[1.0, 2.0]);
        assert_eq!(mapped.records()[0].resource_embedding(), &[3.0, 4.0]);
        assert_eq!(mapped.records()[1].need_embedding(), &[3.0, 4.0]);
    }

    #[test]
    fn test_empty_text_gets_zero_vector() {
        let temp = TempDir::new().unwrap();
        let cache = cache_with(&temp, &[("a", vec![1.0, 2.0, 3.0])]);
        let t = table(&[("1", "   ", "a")]);

        let mapped = map_rows(&t, &cache, &config()).unwrap();

        assert_eq!(mapped.records()[0].need_embedding(), &[0.0, 0.0, 0.0]);
        assert_eq!(mapped.missing(), 0);
    }

    #[test]
    fn test_uncached_text_is_zero_filled_and_counted() {
        let temp = TempDir::new().unwrap();
        let cache = cache_with(&temp, &[("a", vec![1.0, 2.0])]);
        let t = table(&[("1", "a", "never embedded")]);

        let mapped = map_rows(&t, &cache, &config()).unwrap();

        assert_eq!(mapped.records()[0].resource_embedding(), &[0.0, 0.0]);
        assert_eq!(mapped.missing(), 1);
    }

    #[test]
    fn test_strict_missing_rejects_uncached_text() {
        let temp = TempDir::new().unwrap();
        let cache = cache_with(&temp, &[("a", vec![1.0, 2.0])]);
        let t = table(&[("1", "x", "y")]);
        let strict = MappingConfig {
            strict_missing: true,
            ..config()
        };

        assert!(matches!(
            map_rows(&t, &cache, &strict),
            Err(PipelineError::MissingEmbeddings { count: 2 })
        ));
    }

    #[test]
    fn test_empty_cache_is_an_error() {
        let temp = TempDir::new().unwrap();
        let cache = EmbeddingCache::new(temp.path().join("cache.msgpack"));
        let t = table(&[("1", "", "")]);

        assert!(matches!(
            map_rows(&t, &cache, &config()),
            Err(PipelineError::EmptyCacheAtMapping)
        ));
    }

    #[test]
    fn test_write_csv_layout() {
        let temp = TempDir::new().unwrap();
        let cache = cache_with(&temp, &[("a", vec![0.5, 0.25])]);
        let t = table(&[("1", "a", "")]);
        let out = temp.path().join("out").join("pairs.csv");

        map_rows(&t, &cache, &config())
            .unwrap()
            .write_csv(&out)
            .unwrap();

        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(
            written,
            "id,need,res,need_emb_0,need_emb_1,res_emb_0,res_emb_1\n1,a,,0.5,0.25,0,0\n"
        );
    }
}
