//! Embedding cache: normalized text -> fixed-dimension vector.
//!
//! On disk the cache is a single MessagePack snapshot. Saves go to
//! `<path>.tmp` first and are renamed over `<path>`; the rename is the only
//! write that touches the canonical path.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CacheError;

/// Snapshot format version written by this crate.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: BTreeMap<&'a str, &'a [f32]>,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    entries: HashMap<String, Vec<f32>>,
}

/// Normalize a raw field value into a cache key.
///
/// Lookups and inserts both go through this, so a key is found regardless of
/// surrounding whitespace in the source table.
pub fn normalize(text: &str) -> &str {
    text.trim()
}

/// Path of the staging file used while saving `path`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// In-memory embedding cache bound to its durable location.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    path: PathBuf,
    entries: HashMap<String, Vec<f32>>,
    dimension: Option<usize>,
}

impl EmbeddingCache {
    /// Create an empty cache that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
            dimension: None,
        }
    }

    /// Load the cache stored at `path`, or an empty cache if there is none.
    ///
    /// A file that cannot be decoded, or that breaks the key/dimension
    /// invariants, is reported as `CacheError::Corrupt` and left untouched.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if !path.exists() {
            info!(path = ?path, "No cache file, starting empty");
            return Ok(Self::new(path));
        }

        let bytes = fs::read(&path)?;
        let snapshot: Snapshot = rmp_serde::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        if snapshot.version != CACHE_FORMAT_VERSION {
            return Err(CacheError::Corrupt {
                path,
                reason: format!("unsupported format version {}", snapshot.version),
            });
        }

        let mut dimension = None;
        for (key, vector) in &snapshot.entries {
            if key.is_empty() || normalize(key) != key.as_str() {
                return Err(CacheError::Corrupt {
                    path,
                    reason: format!("key {:?} is not normalized", key),
                });
            }
            if vector.is_empty() {
                return Err(CacheError::Corrupt {
                    path,
                    reason: format!("empty vector for key {:?}", key),
                });
            }
            match dimension {
                None => dimension = Some(vector.len()),
                Some(d) if d != vector.len() => {
                    return Err(CacheError::Corrupt {
                        path,
                        reason: format!(
                            "mixed vector lengths: {} and {} (key {:?})",
                            d,
                            vector.len(),
                            key
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        info!(
            path = ?path,
            entries = snapshot.entries.len(),
            dimension = ?dimension,
            "Loaded embedding cache"
        );

        Ok(Self {
            path,
            entries: snapshot.entries,
            dimension,
        })
    }

    /// Persist the whole cache atomically.
    pub fn save(&self) -> Result<(), CacheError> {
        let tmp = self.write_tmp()?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = ?self.path, entries = self.entries.len(), "Saved embedding cache");
        Ok(())
    }

    /// Write the snapshot to the staging path and flush it to disk.
    fn write_tmp(&self) -> Result<PathBuf, CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let snapshot = SnapshotRef {
            version: CACHE_FORMAT_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_slice()))
                .collect(),
        };
        let bytes = rmp_serde::to_vec_named(&snapshot)?;

        let tmp = tmp_path_for(&self.path);
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(tmp)
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.entries.get(normalize(key)).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(normalize(key))
    }

    /// Insert or replace the vector for `key`.
    ///
    /// The first vector fixes the cache dimension; later vectors must match it.
    pub fn put(&mut self, key: &str, vector: Vec<f32>) -> Result<(), CacheError> {
        let key = normalize(key);
        if key.is_empty() {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        if vector.is_empty() {
            return Err(CacheError::EmptyVector(key.to_string()));
        }
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(CacheError::DimensionMismatch {
                    key: key.to_string(),
                    expected,
                    actual: vector.len(),
                });
            }
        }

        self.dimension = Some(vector.len());
        self.entries.insert(key.to_string(), vector);
        Ok(())
    }

    /// Vector dimension shared by every entry, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> EmbeddingCache {
        EmbeddingCache::new(dir.path().join("cache.msgpack"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = EmbeddingCache::load(temp.path().join("absent.msgpack")).unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.dimension(), None);
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let mut cache = cache_in(&temp);
        cache.put("alpha", vec![0.1, 0.2, 0.3]).unwrap();
        cache.put("beta", vec![0.4, 0.5, 0.6]).unwrap();
        cache.save().unwrap();

        let loaded = EmbeddingCache::load(cache.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), Some(3));
        assert_eq!(loaded.get("alpha"), Some(&[0.1, 0.2, 0.3][..]));
        assert_eq!(loaded.get("beta"), Some(&[0.4, 0.5, 0.6][..]));
        assert!(!tmp_path_for(cache.path()).exists());
    }

    #[test]
    fn test_keys_are_trimmed() {
        let temp = TempDir::new().unwrap();
        let mut cache = cache_in(&temp);
        cache.put("  padded text\n", vec![1.0]).unwrap();
        assert!(cache.contains("padded text"));
        assert_eq!(cache.get("\tpadded text "), Some(&[1.0][..]));
    }

    #[test]
    fn test_put_rejects_empty_key_and_vector() {
        let temp = TempDir::new().unwrap();
        let mut cache = cache_in(&temp);
        assert!(matches!(
            cache.put("   ", vec![1.0]),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(
            cache.put("text", vec![]),
            Err(CacheError::EmptyVector(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_rejects_dimension_mismatch() {
        let temp = TempDir::new().unwrap();
        let mut cache = cache_in(&temp);
        cache.put("a", vec![1.0, 2.0]).unwrap();
        let err = cache.put("b", vec![1.0, 2.0, 3.0]).unwrap_err();
        match err {
            CacheError::DimensionMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!cache.contains("b"));
        assert_eq!(cache.dimension(), Some(2));
    }

    #[test]
    fn test_load_rejects_mixed_dimensions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mixed.msgpack");

        let short = [1.0f32];
        let long = [1.0f32, 2.0];
        let mut entries = BTreeMap::new();
        entries.insert("short", &short[..]);
        entries.insert("long", &long[..]);
        let bytes = rmp_serde::to_vec_named(&SnapshotRef {
            version: CACHE_FORMAT_VERSION,
            entries,
        })
        .unwrap();
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            EmbeddingCache::load(&path),
            Err(CacheError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_load_rejects_garbage_and_keeps_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("garbage.msgpack");
        fs::write(&path, b"definitely not msgpack").unwrap();

        assert!(matches!(
            EmbeddingCache::load(&path),
            Err(CacheError::Corrupt { .. })
        ));
        // Never reset user data
        assert_eq!(fs::read(&path).unwrap(), b"definitely not msgpack");
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("future.msgpack");
        let bytes = rmp_serde::to_vec_named(&SnapshotRef {
            version: CACHE_FORMAT_VERSION + 1,
            entries: BTreeMap::new(),
        })
        .unwrap();
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            EmbeddingCache::load(&path),
            Err(CacheError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_crash_before_rename_keeps_previous_cache() {
        let temp = TempDir::new().unwrap();
        let mut cache = cache_in(&temp);
        cache.put("old", vec![1.0, 1.0]).unwrap();
        cache.save().unwrap();

        // Stage a newer snapshot but "crash" before the rename
        cache.put("new", vec![2.0, 2.0]).unwrap();
        let tmp = cache.write_tmp().unwrap();
        assert!(tmp.exists());

        let survived = EmbeddingCache::load(cache.path()).unwrap();
        assert_eq!(survived.len(), 1);
        assert!(survived.contains("old"));

        // A truncated staging file is equally harmless
        fs::write(&tmp, &b"\x82\xa7ver"[..]).unwrap();
        let survived = EmbeddingCache::load(cache.path()).unwrap();
        assert_eq!(survived.len(), 1);
    }

    #[test]
    fn test_crash_after_rename_leaves_new_cache() {
        let temp = TempDir::new().unwrap();
        let mut cache = cache_in(&temp);
        cache.put("old", vec![1.0, 1.0]).unwrap();
        cache.save().unwrap();

        cache.put("new", vec![2.0, 2.0]).unwrap();
        let tmp = cache.write_tmp().unwrap();
        fs::rename(&tmp, cache.path()).unwrap();

        let loaded = EmbeddingCache::load(cache.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("new"), Some(&[2.0, 2.0][..]));
    }

    #[test]
    fn test_save_overwrites_stale_tmp() {
        let temp = TempDir::new().unwrap();
        let mut cache = cache_in(&temp);
        fs::write(tmp_path_for(cache.path()), b"left over from a crash").unwrap();

        cache.put("a", vec![0.5]).unwrap();
        cache.save().unwrap();

        let loaded = EmbeddingCache::load(cache.path()).unwrap();
        assert_eq!(loaded.get("a"), Some(&[0.5][..]));
        assert!(!tmp_path_for(cache.path()).exists());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let mut cache = EmbeddingCache::new(temp.path().join("nested/dir/cache.msgpack"));
        cache.put("a", vec![0.5]).unwrap();
        cache.save().unwrap();
        assert!(cache.path().exists());
    }

    #[test]
    fn test_tmp_path_suffix() {
        assert_eq!(
            tmp_path_for(Path::new("/data/embeddings_cache.msgpack")),
            PathBuf::from("/data/embeddings_cache.msgpack.tmp")
        );
    }
}
