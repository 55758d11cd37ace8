//! embedcache
//!
//! Deduplicates two text columns of a CSV table, embeds uncached texts through
//! an OpenAI-compatible service, and writes the table back with the vectors
//! appended.
//!
//! # Usage
//!
//! ```bash
//! embedcache run [--input PATH] [--cache PATH] [--output PATH]
//! embedcache embed [--batch-size N]
//! embedcache map [--strict]
//! embedcache inspect
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/embedcache/config.toml)
//! 3. Config file given with --config
//! 4. Environment variables (EMBEDCACHE_*, plus OPENAI_API_KEY)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use embedcache_cli::{
    embed_command, init_logging, inspect_command, load_settings, map_command, run_command,
    BatchArgs, Cli, Commands, PathArgs,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Run { paths, batch } => {
            let settings = load_settings(config, log_level, &paths, &batch)?;
            init_logging(&settings)?;
            run_command(&settings).await?;
        }
        Commands::Embed { paths, batch } => {
            let settings = load_settings(config, log_level, &paths, &batch)?;
            init_logging(&settings)?;
            embed_command(&settings).await?;
        }
        Commands::Map { paths, strict } => {
            let mut settings = load_settings(config, log_level, &paths, &BatchArgs::default())?;
            settings.mapping.strict_missing |= strict;
            init_logging(&settings)?;
            map_command(&settings)?;
        }
        Commands::Inspect { cache } => {
            let paths = PathArgs {
                cache,
                ..Default::default()
            };
            let settings = load_settings(config, log_level, &paths, &BatchArgs::default())?;
            init_logging(&settings)?;
            inspect_command(&settings)?;
        }
    }

    Ok(())
}
