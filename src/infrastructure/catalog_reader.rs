//! Read-side queries over the catalog tables
//!
//! Browsing what the pipeline stored: brands, the models of a brand, and single
//! records with whatever attribute columns they have values for.

use std::collections::BTreeMap;

use anyhow::Result;
use sqlx::{Column, Row, SqlitePool};

use crate::domain::{BRAND_COLUMN, CatalogRecord, MODEL_COLUMN, is_identity_column};
use crate::infrastructure::schema_manager::quote_ident;

#[derive(Clone)]
pub struct CatalogReader {
    pool: SqlitePool,
}

impl CatalogReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Distinct brands in a table, sorted
    pub async fn brands(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {brand} FROM {table} WHERE {brand} IS NOT NULL ORDER BY {brand}",
            brand = quote_ident(BRAND_COLUMN),
            table = quote_ident(table),
        );
        let brands = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(brands)
    }

    /// Models of one brand, sorted
    pub async fn models(&self, table: &str, brand: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT {model} FROM {table} WHERE {brand} = ? ORDER BY {model}",
            model = quote_ident(MODEL_COLUMN),
            brand = quote_ident(BRAND_COLUMN),
            table = quote_ident(table),
        );
        let models = sqlx::query_scalar::<_, String>(&sql)
            .bind(brand)
            .fetch_all(&self.pool)
            .await?;
        Ok(models)
    }

    /// Full record for a model; NULL attribute columns are left out.
    pub async fn record(&self, table: &str, model: &str) -> Result<Option<CatalogRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_ident(table),
            quote_ident(MODEL_COLUMN)
        );
        let Some(row) = sqlx::query(&sql).bind(model).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let brand: Option<String> = row.try_get(BRAND_COLUMN)?;
        let model: String = row.try_get(MODEL_COLUMN)?;
        let mut attributes = BTreeMap::new();
        for column in row.columns() {
            let name = column.name();
            if is_identity_column(name) {
                continue;
            }
            let value: Option<String> = row.try_get(column.ordinal())?;
            if let Some(value) = value {
                attributes.insert(name.to_string(), value);
            }
        }

        Ok(Some(CatalogRecord {
            brand,
            model,
            attributes,
        }))
    }

    pub async fn count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NormalizedAttributeSet;
    use crate::infrastructure::schema_manager::SchemaManager;
    use crate::infrastructure::upsert_writer::UpsertWriter;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn reads_back_what_was_written() -> Result<()> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let mut schema = SchemaManager::new(pool.clone());
        schema.ensure_table("primaryItems").await?;
        schema.ensure_columns("primaryItems", ["Sensor", "ISO"]).await?;

        let writer = UpsertWriter::new(pool.clone());
        let z9: NormalizedAttributeSet = [("Sensor", "Full Frame")].into_iter().collect();
        let x100: NormalizedAttributeSet = [("ISO", "200-6400")].into_iter().collect();
        writer.upsert("primaryItems", "Nikon", "Z9", &z9).await?;
        writer.upsert("primaryItems", "Fujifilm", "X100", &x100).await?;
        writer.upsert("primaryItems", "Nikon", "Z6", &NormalizedAttributeSet::new()).await?;

        let reader = CatalogReader::new(pool);
        assert_eq!(reader.count("primaryItems").await?, 3);
        assert_eq!(reader.brands("primaryItems").await?, ["Fujifilm", "Nikon"]);
        assert_eq!(reader.models("primaryItems", "Nikon").await?, ["Z6", "Z9"]);

        let record = reader.record("primaryItems", "Z9").await?.expect("Z9 stored");
        assert_eq!(record.brand.as_deref(), Some("Nikon"));
        assert_eq!(record.attribute("Sensor"), Some("Full Frame"));
        assert_eq!(record.attribute("ISO"), None);
        assert!(reader.record("primaryItems", "D850").await?.is_none());
        Ok(())
    }
}
