//! Additive schema management for catalog tables
//!
//! Tables start as `(brand, model)` and grow one loosely-typed text column per
//! newly seen attribute. Columns are never removed or renamed.

use std::collections::{HashMap, HashSet};

use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{BRAND_COLUMN, MODEL_COLUMN};

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to create table '{table}': {source}")]
    CreateTable {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to introspect table '{table}': {source}")]
    Introspect {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to add column '{column}' to table '{table}': {source}")]
    AddColumn {
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Column name for table '{table}' is empty")]
    EmptyColumn { table: String },
}

impl SchemaError {
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::Introspect { table, .. }
            | Self::AddColumn { table, .. }
            | Self::EmptyColumn { table } => table,
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            Self::AddColumn { column, .. } => Some(column),
            _ => None,
        }
    }
}

/// Outcome of [`SchemaManager::ensure_column`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnChange {
    AlreadyPresent,
    Added,
}

/// Known columns of one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    columns: Vec<String>,
    lookup: HashSet<String>,
}

impl SchemaDescriptor {
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut descriptor = Self::default();
        for column in columns {
            descriptor.add(column.into());
        }
        descriptor
    }

    /// SQLite compares identifiers case-insensitively, so does this.
    pub fn contains(&self, column: &str) -> bool {
        self.lookup.contains(&column.to_lowercase())
    }

    /// Column names in table order, as stored
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn add(&mut self, column: String) {
        if self.lookup.insert(column.to_lowercase()) {
            self.columns.push(column);
        }
    }
}

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Keeps table schemas in step with the attributes being written
pub struct SchemaManager {
    pool: SqlitePool,
    cache: HashMap<String, SchemaDescriptor>,
}

impl SchemaManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: HashMap::new(),
        }
    }

    /// Create `table` with its identity columns if it does not exist.
    pub async fn ensure_table(&mut self, table: &str) -> Result<&SchemaDescriptor, SchemaError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} TEXT, {} TEXT PRIMARY KEY)",
            quote_ident(table),
            quote_ident(BRAND_COLUMN),
            quote_ident(MODEL_COLUMN),
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|source| SchemaError::CreateTable {
                table: table.to_string(),
                source,
            })?;
        self.introspect(table).await
    }

    /// Make sure `column` exists in `table`, adding it as TEXT if needed.
    pub async fn ensure_column(&mut self, table: &str, column: &str) -> Result<ColumnChange, SchemaError> {
        if column.is_empty() {
            return Err(SchemaError::EmptyColumn {
                table: table.to_string(),
            });
        }
        if self.cache.get(table).is_some_and(|d| d.contains(column)) {
            return Ok(ColumnChange::AlreadyPresent);
        }

        // Cache miss: someone else may have added it since we last looked
        if self.introspect(table).await?.contains(column) {
            return Ok(ColumnChange::AlreadyPresent);
        }

        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT",
            quote_ident(table),
            quote_ident(column)
        );
        if let Err(source) = sqlx::query(&sql).execute(&self.pool).await {
            warn!("Store rejected column '{}' on '{}': {}", column, table, source);
            return Err(SchemaError::AddColumn {
                table: table.to_string(),
                column: column.to_string(),
                source,
            });
        }

        info!("Added column '{}' to '{}'", column, table);
        self.cache
            .entry(table.to_string())
            .or_default()
            .add(column.to_string());
        Ok(ColumnChange::Added)
    }

    /// Ensure every column, stopping at the first failure. Returns how many were added.
    pub async fn ensure_columns<'a, I>(&mut self, table: &str, columns: I) -> Result<usize, SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = 0;
        for column in columns {
            if self.ensure_column(table, column).await? == ColumnChange::Added {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Cached descriptor, if the table has been seen this run
    pub fn descriptor(&self, table: &str) -> Option<&SchemaDescriptor> {
        self.cache.get(table)
    }

    /// Re-read the table's columns from the store and refresh the cache.
    pub async fn introspect(&mut self, table: &str) -> Result<&SchemaDescriptor, SchemaError> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| SchemaError::Introspect {
                table: table.to_string(),
                source,
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name").map_err(|source| SchemaError::Introspect {
                table: table.to_string(),
                source,
            })?;
            columns.push(name);
        }
        debug!("Table '{}' has {} columns", table, columns.len());

        let descriptor = SchemaDescriptor::from_columns(columns);
        Ok(self.cache.entry(table.to_string()).insert_entry(descriptor).into_mut())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
