//! Insert-or-update of catalog records keyed by model
//!
//! Only the columns supplied by the current record are touched on conflict, so a
//! re-run never blanks what an earlier run stored.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use crate::domain::{BRAND_COLUMN, MODEL_COLUMN, NormalizedAttributeSet};
use crate::infrastructure::schema_manager::{SchemaError, quote_ident};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to write model '{model}' to '{table}': {source}")]
    Write {
        table: String,
        model: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Refusing to write a record without a model to '{table}'")]
    EmptyModel { table: String },
}

impl StoreError {
    /// Schema failures halt the run; a failed write only loses one record.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Schema(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Attribute columns carried by the statement
    pub columns_written: usize,
    pub rows_affected: u64,
}

/// Build the upsert statement for a set of attribute columns.
///
/// Placeholders are bound in order: brand, model, then each column.
pub fn build_upsert_sql(table: &str, columns: &[&str]) -> String {
    let mut names = vec![quote_ident(BRAND_COLUMN), quote_ident(MODEL_COLUMN)];
    names.extend(columns.iter().map(|c| quote_ident(c)));
    let placeholders = vec!["?"; names.len()].join(", ");

    let conflict_action = if columns.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let assignments = columns
            .iter()
            .map(|c| {
                let quoted = quote_ident(c);
                format!("{quoted} = excluded.{quoted}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {assignments}")
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
        quote_ident(table),
        names.join(", "),
        placeholders,
        quote_ident(MODEL_COLUMN),
        conflict_action
    )
}

#[derive(Clone)]
pub struct UpsertWriter {
    pool: SqlitePool,
}

impl UpsertWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new record or update the supplied columns of an existing one.
    ///
    /// Blank values are dropped before the statement is built. The stored brand
    /// is never changed by a later write. Every column must already exist.
    pub async fn upsert(
        &self,
        table: &str,
        brand: &str,
        model: &str,
        attributes: &NormalizedAttributeSet,
    ) -> Result<UpsertOutcome, StoreError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(StoreError::EmptyModel {
                table: table.to_string(),
            });
        }

        let (columns, values): (Vec<&str>, Vec<&str>) = attributes.non_blank().unzip();
        let sql = build_upsert_sql(table, &columns);

        let mut query = sqlx::query(&sql).bind(brand.trim()).bind(model);
        for value in values {
            query = query.bind(value);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Write {
                table: table.to_string(),
                model: model.to_string(),
                source,
            })?;

        debug!(
            "Upserted '{}' into '{}' with {} attributes",
            model,
            table,
            columns.len()
        );
        Ok(UpsertOutcome {
            columns_written: columns.len(),
            rows_affected: result.rows_affected(),
        })
    }
}
