//! Configuration loading for embedcache.
//!
//! Layered config: defaults -> user config file -> `--config` file -> env vars.
//! CLI flags are applied by the caller on top of the loaded `Settings`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Remote embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// API key (prefer env vars over storing it in a config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: default_api_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingSettings {
    /// The configured credential, treating a blank key as absent.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::CredentialMissing)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batching, checkpointing and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Number of texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Persist the cache after this many successful batches
    #[serde(default = "default_save_every")]
    pub save_every: usize,

    /// Delay between consecutive batches (ms)
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Attempts per batch before the run aborts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base; attempt n waits `retry_backoff^(n-1)` seconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
}

fn default_batch_size() -> usize {
    64
}

fn default_save_every() -> usize {
    5
}

fn default_pacing_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff() -> f64 {
    2.0
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            save_every: default_save_every(),
            pacing_ms: default_pacing_ms(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl BatchSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Row mapping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSettings {
    /// Column name prefix for the need-side vector
    #[serde(default = "default_need_prefix")]
    pub need_prefix: String,

    /// Column name prefix for the resource-side vector
    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,

    /// Fail the run instead of zero-filling texts missing from the cache
    #[serde(default)]
    pub strict_missing: bool,
}

fn default_need_prefix() -> String {
    "need_emb_".to_string()
}

fn default_resource_prefix() -> String {
    "res_emb_".to_string()
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            need_prefix: default_need_prefix(),
            resource_prefix: default_resource_prefix(),
            strict_missing: false,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Input CSV produced by the upstream extraction
    #[serde(default = "default_input_path")]
    pub input_path: String,

    /// Durable embedding cache file
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// Augmented output CSV
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// First text column (need side)
    #[serde(default = "default_need_column")]
    pub need_column: String,

    /// Second text column (resource side)
    #[serde(default = "default_resource_column")]
    pub resource_column: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub batch: BatchSettings,

    #[serde(default)]
    pub mapping: MappingSettings,
}

fn default_input_path() -> String {
    "from_db.csv".to_string()
}

fn default_cache_path() -> String {
    "embeddings_cache.msgpack".to_string()
}

fn default_output_path() -> String {
    "pairs_with_embeddings.csv".to_string()
}

fn default_need_column() -> String {
    "need_description".to_string()
}

fn default_resource_column() -> String {
    "academic_resource_description".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            cache_path: default_cache_path(),
            output_path: default_output_path(),
            need_column: default_need_column(),
            resource_column: default_resource_column(),
            log_level: default_log_level(),
            embedding: EmbeddingSettings::default(),
            batch: BatchSettings::default(),
            mapping: MappingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/embedcache/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (EMBEDCACHE_*, nested keys split by `__`)
    ///
    /// `OPENAI_API_KEY` is used when no other source provides a credential.
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "embedcache")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("input_path", default_input_path())?
            .set_default("cache_path", default_cache_path())?
            .set_default("output_path", default_output_path())?
            .set_default("need_column", default_need_column())?
            .set_default("resource_column", default_resource_column())?
            .set_default("log_level", default_log_level())?
            .set_default("embedding.model", default_model())?
            .set_default("embedding.api_base_url", default_api_base_url())?
            .set_default("embedding.timeout_secs", default_timeout_secs() as i64)?
            .set_default("batch.batch_size", default_batch_size() as i64)?
            .set_default("batch.save_every", default_save_every() as i64)?
            .set_default("batch.pacing_ms", default_pacing_ms() as i64)?
            .set_default("batch.max_retries", default_max_retries() as i64)?
            .set_default("batch.retry_backoff", default_retry_backoff())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: EMBEDCACHE_CACHE_PATH, EMBEDCACHE_BATCH__BATCH_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("EMBEDCACHE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if settings.embedding.api_key.is_none() {
            settings.embedding.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        Ok(settings)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.batch_size == 0 {
            return Err(invalid("batch.batch_size", "must be > 0"));
        }
        if self.batch.save_every == 0 {
            return Err(invalid("batch.save_every", "must be > 0"));
        }
        if self.batch.max_retries == 0 {
            return Err(invalid("batch.max_retries", "must be > 0"));
        }
        if self.batch.retry_backoff.is_nan() || self.batch.retry_backoff < 1.0 {
            return Err(invalid(
                "batch.retry_backoff",
                format!("must be >= 1.0, got {}", self.batch.retry_backoff),
            ));
        }
        if self.need_column.trim().is_empty() {
            return Err(invalid("need_column", "must not be empty"));
        }
        if self.resource_column.trim().is_empty() {
            return Err(invalid("resource_column", "must not be empty"));
        }
        if self.need_column == self.resource_column {
            return Err(invalid("resource_column", "must differ from need_column"));
        }
        Ok(())
    }

    pub fn input_path(&self) -> PathBuf {
        PathBuf::from(&self.input_path)
    }

    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_path)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_path)
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}
