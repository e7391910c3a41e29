//! Configuration infrastructure
//!
//! Configuration is resolved once, before a run starts, from three layers:
//! 1. Built-in defaults (every section is `#[serde(default)]`)
//! 2. An optional config file (format by extension: toml, json, yaml, ...)
//! 3. `CATALOG_INGEST_*` environment variables, e.g. `CATALOG_INGEST_STORE__DATABASE_URL`
//!
//! The CLI applies its overrides on top of the result.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::Taxonomy;
use crate::infrastructure::parsing::ParsingConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listing and datasheet selectors
    pub site: ParsingConfig,

    /// Persisted store
    pub store: StoreConfig,

    /// Render/fetch agent behaviour
    pub fetch: FetchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// What to ingest on this run
    pub run: RunConfig,
}

/// Store location and table names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx SQLite URL, e.g. `sqlite:/var/lib/catalog/catalog.db`
    pub database_url: String,

    pub primary_table: String,

    pub accessory_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            primary_table: defaults::PRIMARY_TABLE.to_string(),
            accessory_table: defaults::ACCESSORY_TABLE.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn table(&self, taxonomy: Taxonomy) -> &str {
        match taxonomy {
            Taxonomy::Primary => &self.primary_table,
            Taxonomy::Accessory => &self.accessory_table,
        }
    }
}

/// Page render mode requested by the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Visible,
    #[default]
    Headless,
}

/// Render/fetch agent settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub mode: FetchMode,

    /// Upper bound for one page load or one wait-for-element, in seconds
    pub timeout_secs: u64,

    /// Re-check interval while waiting for an element, in milliseconds
    pub poll_interval_ms: u64,

    /// Request pacing towards the source site
    pub max_requests_per_second: u32,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            timeout_secs: defaults::FETCH_TIMEOUT_SECS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Operator-facing verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    #[default]
    Progress,
    Debug,
}

impl LogLevel {
    /// Base `EnvFilter` directive for this level
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Silent => "off",
            Self::Progress => "info",
            Self::Debug => "debug",
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,

    /// Also write a daily-rolling log file
    pub file_logging: bool,

    /// Log file directory; defaults to `logs/` beside the executable
    pub log_dir: Option<PathBuf>,

    /// Emit JSON lines instead of human-readable text to the console
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file_logging: false,
            log_dir: None,
            json_format: false,
        }
    }
}

/// Resolved selection for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Groups (brands) to ingest; matched case-insensitively
    pub selected_groups: BTreeSet<String>,

    /// Ingest every harvested group, ignoring `selected_groups`
    pub all_groups: bool,

    pub include_accessories: bool,

    pub skip_primary: bool,
}

impl RunConfig {
    pub fn is_selected(&self, group: &str) -> bool {
        self.all_groups
            || self
                .selected_groups
                .iter()
                .any(|selected| selected.trim().eq_ignore_ascii_case(group.trim()))
    }

    /// Taxonomies to process, in processing order
    pub fn taxonomies(&self) -> Vec<Taxonomy> {
        let mut taxonomies = Vec::with_capacity(2);
        if !self.skip_primary {
            taxonomies.push(Taxonomy::Primary);
        }
        if self.include_accessories {
            taxonomies.push(Taxonomy::Accessory);
        }
        taxonomies
    }
}

impl AppConfig {
    /// Load defaults, then the optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from: {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("run.selected_groups"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for table in [&self.store.primary_table, &self.store.accessory_table] {
            if !is_plain_identifier(table) {
                return Err(ConfigError::validation(format!(
                    "table name '{table}' must match [A-Za-z_][A-Za-z0-9_]*"
                )));
            }
        }
        if self.store.primary_table.eq_ignore_ascii_case(&self.store.accessory_table) {
            return Err(ConfigError::validation(
                "primary_table and accessory_table must be distinct tables",
            ));
        }
        if self.store.database_url.trim().is_empty() {
            return Err(ConfigError::validation("database_url must not be empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::validation("fetch.timeout_secs must be greater than 0"));
        }
        if self.fetch.poll_interval_ms == 0 {
            return Err(ConfigError::validation("fetch.poll_interval_ms must be greater than 0"));
        }
        if self.fetch.max_requests_per_second == 0 {
            return Err(ConfigError::validation(
                "fetch.max_requests_per_second must be greater than 0",
            ));
        }
        self.site
            .validate()
            .map_err(|e| ConfigError::validation(e.to_string()))
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `sqlite:<data dir>/catalog-ingest/catalog.db`, or a file in the working directory
/// when the platform has no data directory.
pub fn default_database_url() -> String {
    let path = dirs::data_dir().map_or_else(
        || PathBuf::from(defaults::DATABASE_FILE),
        |dir| dir.join(defaults::APP_DIR).join(defaults::DATABASE_FILE),
    );
    format!("sqlite:{}", path.display())
}

/// Source site locators
pub mod source_site {
    pub const BASE_URL: &str = "https://www.digitalkamera.de";

    /// Quick-access listing of all camera bodies, grouped by manufacturer
    pub const PRIMARY_LISTING_URL: &str = "https://www.digitalkamera.de/Kamera/Schnellzugriff.aspx";

    /// Quick-access listing of all lenses, grouped by manufacturer
    pub const ACCESSORY_LISTING_URL: &str = "https://www.digitalkamera.de/Objektiv/Schnellzugriff.aspx";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR: &str = "catalog-ingest";

    pub const DATABASE_FILE: &str = "catalog.db";

    pub const PRIMARY_TABLE: &str = "primaryItems";

    pub const ACCESSORY_TABLE: &str = "accessoryItems";

    /// Page load / wait-for timeout in seconds
    pub const FETCH_TIMEOUT_SECS: u64 = 10;

    pub const POLL_INTERVAL_MS: u64 = 250;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    pub const USER_AGENT: &str = "catalog-ingest/0.1 (+sequential datasheet harvester)";

    pub const ENV_PREFIX: &str = "CATALOG_INGEST";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch.timeout(), Duration::from_secs(10));
        assert_eq!(config.store.table(Taxonomy::Primary), "primaryItems");
        assert_eq!(config.store.table(Taxonomy::Accessory), "accessoryItems");
        assert!(config.store.database_url.starts_with("sqlite:"));
    }

    #[test]
    fn identical_tables_are_rejected() {
        let mut config = AppConfig::default();
        config.store.accessory_table = "PRIMARYITEMS".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn unsafe_table_names_are_rejected() {
        let mut config = AppConfig::default();
        config.store.primary_table = "items; DROP TABLE x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = AppConfig::default();
        config.fetch.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn group_selection_is_case_insensitive() {
        let run = RunConfig {
            selected_groups: ["nikon".to_string(), " Sony ".to_string()].into_iter().collect(),
            ..RunConfig::default()
        };
        assert!(run.is_selected("Nikon"));
        assert!(run.is_selected("SONY"));
        assert!(!run.is_selected("Canon"));

        let all = RunConfig {
            all_groups: true,
            ..RunConfig::default()
        };
        assert!(all.is_selected("Leica"));
    }

    #[test]
    fn taxonomy_order_follows_flags() {
        let mut run = RunConfig::default();
        assert_eq!(run.taxonomies(), vec![Taxonomy::Primary]);
        run.include_accessories = true;
        assert_eq!(run.taxonomies(), vec![Taxonomy::Primary, Taxonomy::Accessory]);
        run.skip_primary = true;
        assert_eq!(run.taxonomies(), vec![Taxonomy::Accessory]);
        run.include_accessories = false;
        assert!(run.taxonomies().is_empty());
    }

    #[test]
    fn loads_partial_toml_file_over_defaults() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            r#"
[store]
database_url = "sqlite:/tmp/catalog-test.db"

[fetch]
mode = "visible"
timeout_secs = 5

[run]
selected_groups = ["Nikon", "Leica"]
include_accessories = true
"#
        )?;

        let config = AppConfig::load(Some(file.path()))?;
        assert_eq!(config.store.database_url, "sqlite:/tmp/catalog-test.db");
        assert_eq!(config.store.primary_table, "primaryItems");
        assert_eq!(config.fetch.mode, FetchMode::Visible);
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.poll_interval_ms, defaults::POLL_INTERVAL_MS);
        assert!(config.run.is_selected("leica"));
        assert!(config.run.include_accessories);
        Ok(())
    }
}
