//! embedcache command-line library.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, embed, map, inspect)

pub mod cli;
pub mod commands;

pub use cli::{BatchArgs, Cli, Commands, PathArgs};
pub use commands::{
    embed_command, init_logging, inspect_command, load_settings, map_command, run_command,
};
