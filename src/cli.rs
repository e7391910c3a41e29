//! Command-line overrides
//!
//! Flags are applied on top of the file/environment configuration, so the
//! pipeline only ever sees one resolved `AppConfig`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::infrastructure::config::{AppConfig, ConfigError, FetchMode, LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Silent,
    Progress,
    Debug,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Silent => Self::Silent,
            LogLevelArg::Progress => Self::Progress,
            LogLevelArg::Debug => Self::Debug,
        }
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "catalog-ingest",
    version,
    about = "Harvest product datasheets and upsert their specs into SQLite"
)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "CATALOG_INGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL, e.g. sqlite:catalog.db
    #[arg(long)]
    pub database: Option<String>,

    /// Group (brand) to ingest; repeat or comma-separate for several
    #[arg(long = "group", value_delimiter = ',')]
    pub groups: Vec<String>,

    /// Ingest every group on the listing
    #[arg(long, conflicts_with = "groups")]
    pub all_groups: bool,

    /// Also ingest the accessory listing
    #[arg(long)]
    pub accessories: bool,

    /// Skip the primary listing
    #[arg(long)]
    pub skip_primary: bool,

    /// Fetch without a visible window (default)
    #[arg(long, conflicts_with = "visible")]
    pub headless: bool,

    /// Fetch with a visible window where the agent supports one
    #[arg(long)]
    pub visible: bool,

    /// Console verbosity
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevelArg>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Load file and environment configuration, then apply these flags.
    pub fn resolve_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        self.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Flags only override what they name.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(database) = &self.database {
            config.store.database_url.clone_from(database);
        }
        let groups: Vec<String> = self
            .groups
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        if !groups.is_empty() {
            config.run.selected_groups = groups.into_iter().collect();
        }
        if self.all_groups {
            config.run.all_groups = true;
        }
        if self.accessories {
            config.run.include_accessories = true;
        }
        if self.skip_primary {
            config.run.skip_primary = true;
        }
        if self.headless {
            config.fetch.mode = FetchMode::Headless;
        } else if self.visible {
            config.fetch.mode = FetchMode::Visible;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_configuration() {
        let cli = Cli::parse_from([
            "catalog-ingest",
            "--group",
            "Nikon,Leica",
            "--group",
            " Sony ",
            "--accessories",
            "--visible",
            "--log-level",
            "debug",
            "--database",
            "sqlite:/tmp/x.db",
        ]);

        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert!(config.run.is_selected("nikon"));
        assert!(config.run.is_selected("Sony"));
        assert!(!config.run.is_selected("Canon"));
        assert!(config.run.include_accessories);
        assert_eq!(config.fetch.mode, FetchMode::Visible);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.store.database_url, "sqlite:/tmp/x.db");
    }

    #[test]
    fn no_flags_change_nothing() {
        let cli = Cli::parse_from(["catalog-ingest"]);
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn all_groups_conflicts_with_explicit_groups() {
        let parsed = Cli::try_parse_from(["catalog-ingest", "--all-groups", "--group", "Nikon"]);
        assert!(parsed.is_err());
    }
}
