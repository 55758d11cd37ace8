//! # embedcache-types
//!
//! Shared configuration types for the embedcache pipeline.
//!
//! - `Settings`: layered configuration (defaults, config file, env vars)
//! - `ConfigError`: configuration loading and validation failures
//!
//! ## Usage
//!
//! ```rust,no_run
//! use embedcache_types::Settings;
//!
//! let settings = Settings::load(None).expect("config");
//! println!("cache at {}", settings.cache_path);
//! ```

pub mod config;
pub mod error;

pub use config::{BatchSettings, EmbeddingSettings, MappingSettings, Settings};
pub use error::ConfigError;
