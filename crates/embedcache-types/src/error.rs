//! Error types for settings.

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration sources could not be read or merged
    #[error("Configuration error: {0}")]
    Load(String),

    /// A setting holds a value the pipeline cannot run with
    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// No API credential in config, `EMBEDCACHE_EMBEDDING__API_KEY` or `OPENAI_API_KEY`
    #[error("No API credential configured (set embedding.api_key or OPENAI_API_KEY)")]
    CredentialMissing,
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
