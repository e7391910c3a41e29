//! Infrastructure layer for the store, page fetching, parsing and runtime setup
//!
//! Everything that touches the outside world lives here: the SQLite catalog
//! store and its schema, the render agent, HTML parsers, configuration and logging.

pub mod catalog_reader;
pub mod config;
pub mod database_connection;
pub mod logging;
pub mod parsing;
pub mod render_agent;
pub mod schema_manager;
pub mod upsert_writer;

// Re-export commonly used items
pub use catalog_reader::CatalogReader;
pub use config::{AppConfig, ConfigError, FetchConfig, FetchMode, LogLevel, LoggingConfig, RunConfig, StoreConfig};
pub use database_connection::DatabaseConnection;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use parsing::{LinkHarvester, ParsingConfig, SpecExtractor};
pub use render_agent::{FetchError, HttpRenderAgent, RenderAgent, RenderedPage};
pub use schema_manager::{ColumnChange, SchemaDescriptor, SchemaError, SchemaManager};
pub use upsert_writer::{StoreError, UpsertOutcome, UpsertWriter};
