//! # embedcache-pipeline
//!
//! Cache-backed batch embedding of two text columns.
//!
//! Flow: `normalize` (unique texts) -> cache lookup -> `engine` (embed misses,
//! checkpoint the cache) -> `mapper` (join vectors back onto rows) -> CSV.
//!
//! Everything runs as one sequential task: the engine is the only writer of
//! the cache and finishes before the mapper reads it.

pub mod engine;
pub mod error;
pub mod mapper;
pub mod normalize;
pub mod run;
pub mod table;

pub use engine::{BatchEngine, EngineConfig, EngineStats};
pub use error::PipelineError;
pub use mapper::{map_rows, MappedTable, MappingConfig, RowRecord};
pub use normalize::{pending_texts, unique_texts};
pub use run::{embed_table, map_table, run_on_table, run_pipeline, EmbedReport, RunReport};
pub use table::Table;
