//! Logging system configuration and initialization
//!
//! - Console output filtered by the operator log level (silent / progress / debug)
//! - Optional daily-rolling file log beside the executable
//! - Optional JSON console format
//! - `RUST_LOG` overrides everything
//!
//! Dependency chatter (SQL statements, HTTP internals, html5ever) is suppressed
//! unless `RUST_LOG` asks for it explicitly.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::{LogLevel, LoggingConfig};

const LOG_FILE_PREFIX: &str = "catalog-ingest.log";

/// Targets that stay at `warn` unless `RUST_LOG` says otherwise
const QUIET_TARGETS: &[&str] = &[
    "sqlx",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "html5ever",
    "selectors",
];

// Keeps the non-blocking file writer alive for the life of the process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Local wall-clock timestamps with milliseconds
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
        .join("logs")
}

/// Build the filter for a log level. Not consulted when `RUST_LOG` is set.
pub fn build_env_filter(level: LogLevel) -> Result<EnvFilter> {
    let mut filter = EnvFilter::new(level.as_filter());
    if level != LogLevel::Silent {
        for target in QUIET_TARGETS {
            filter = filter.add_directive(
                format!("{target}=warn")
                    .parse()
                    .map_err(|e| anyhow!("Invalid log directive for {target}: {e}"))?,
            );
        }
    }
    Ok(filter)
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize logging with custom configuration
///
/// ```bash
/// # Show SQL statements on top of debug output
/// RUST_LOG="debug,sqlx::query=debug" catalog-ingest --all-groups
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_env_filter(config.level)?,
    };

    let console_layer = if config.json_format {
        fmt::layer()
            .json()
            .with_timer(LocalTimeFormatter)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(LocalTimeFormatter)
            .with_target(false)
            .boxed()
    };

    let file_layer = if config.file_logging {
        let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {}: {}", log_dir.display(), e))?;

        let (writer, guard) = non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(guard);

        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimeFormatter)
                .with_target(true)
                .boxed(),
        )
    } else {
        None
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Logging initialized at level {:?}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_build_for_every_level() {
        for level in [LogLevel::Silent, LogLevel::Progress, LogLevel::Debug] {
            assert!(build_env_filter(level).is_ok());
        }
    }

    #[test]
    fn progress_filter_quiets_dependencies() {
        let filter = build_env_filter(LogLevel::Progress).unwrap().to_string();
        assert!(filter.contains("info"));
        assert!(filter.contains("sqlx=warn"));
    }

    #[test]
    fn log_directory_is_named_logs() {
        assert!(get_log_directory().ends_with("logs"));
    }
}
