// Database connection and pool management
// This module handles the SQLite catalog store using sqlx

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::infrastructure::catalog_reader::CatalogReader;
use crate::infrastructure::schema_manager::{SchemaError, SchemaManager};
use crate::infrastructure::upsert_writer::UpsertWriter;

/// The catalog store. One connection: the pipeline writes sequentially.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        // Create database file directory if it doesn't exist
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !Path::new(parent).exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {database_url}"))?;

        info!("Connected to catalog store at {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the catalog tables if missing and return a schema manager
    /// primed with their columns.
    pub async fn migrate(&self, tables: &[&str]) -> Result<SchemaManager, SchemaError> {
        let mut schema = self.schema_manager();
        for table in tables {
            schema.ensure_table(table).await?;
        }
        Ok(schema)
    }

    pub fn schema_manager(&self) -> SchemaManager {
        SchemaManager::new(self.pool.clone())
    }

    pub fn upsert_writer(&self) -> UpsertWriter {
        UpsertWriter::new(self.pool.clone())
    }

    pub fn reader(&self) -> CatalogReader {
        CatalogReader::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
