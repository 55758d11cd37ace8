//! Text extraction and order-preserving deduplication.

use std::collections::HashSet;

use embedcache_store::{normalize, EmbeddingCache};

use crate::error::PipelineError;
use crate::table::Table;

/// Unique non-empty trimmed texts from two columns.
///
/// Order is first appearance when scanning the whole `need_column` and then
/// the whole `resource_column`.
pub fn unique_texts(
    table: &Table,
    need_column: &str,
    resource_column: &str,
) -> Result<Vec<String>, PipelineError> {
    let needs = table.column(need_column)?;
    let resources = table.column(resource_column)?;

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for text in needs.chain(resources).map(normalize) {
        if !text.is_empty() && seen.insert(text) {
            unique.push(text.to_string());
        }
    }
    Ok(unique)
}

/// Texts not yet in the cache, in the order given.
pub fn pending_texts(unique: &[String], cache: &EmbeddingCache) -> Vec<String> {
    unique
        .iter()
        .filter(|text| !cache.contains(text))
        .cloned()
        .collect()
}
