//! CLI argument parsing for embedcache.
//!
//! CLI flags override every other configuration source.

use clap::{Args, Parser, Subcommand};

/// Cache-backed batch embedding of tabular text
#[derive(Parser, Debug)]
#[command(name = "embedcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/embedcache/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed uncached texts, then write the augmented table
    Run {
        #[command(flatten)]
        paths: PathArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Embed uncached texts into the cache only
    Embed {
        #[command(flatten)]
        paths: PathArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Write the augmented table from the existing cache, no requests
    Map {
        #[command(flatten)]
        paths: PathArgs,

        /// Fail if any non-empty text has no cached embedding
        #[arg(long)]
        strict: bool,
    },

    /// Show cache path, entry count and dimension
    Inspect {
        /// Override cache path
        #[arg(long)]
        cache: Option<String>,
    },
}

/// File path overrides
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Override input table path
    #[arg(short, long)]
    pub input: Option<String>,

    /// Override cache path
    #[arg(long)]
    pub cache: Option<String>,

    /// Override output table path
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Request engine overrides
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Override embedding model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Override texts per request
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Override attempts per batch
    #[arg(long)]
    pub max_retries: Option<u32>,
}
