//! Catalog Ingest - product datasheet harvesting into an open-ended SQLite schema
//!
//! Discovers grouped datasheet pages on a listing, extracts their attribute
//! tables, normalizes legends into column names, grows the table schema as new
//! attributes appear and upserts each product keyed by model.

// Module declarations
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

pub use application::{IngestionPipeline, PipelineError, RunReport};
pub use cli::Cli;
pub use infrastructure::config::AppConfig;
