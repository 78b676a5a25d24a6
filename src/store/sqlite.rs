//! SQLite [`RecordStore`].
//!
//! All categories share one `bridges` table. Each row keeps the full
//! record as JSON next to a few indexed columns. Rows whose JSON no longer
//! parses, or whose category is unknown, are skipped on read.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use super::{CategoryDocument, RecordStore};
use crate::db;
use crate::migrate;
use crate::models::{BridgeRecord, Category};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects (creating the file if needed) and applies the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool)
            .await
            .context("Failed to apply bridge schema")?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn read_all(&self) -> Result<BTreeMap<Category, CategoryDocument>> {
        let mut docs: BTreeMap<Category, CategoryDocument> = Category::ALL
            .iter()
            .map(|c| (*c, CategoryDocument::default()))
            .collect();

        let rows = sqlx::query("SELECT id, category, record_json FROM bridges ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to query stored bridges")?;

        for row in rows {
            let id: i64 = row.get("id");
            let category: String = row.get("category");
            let record_json: String = row.get("record_json");

            let Ok(category) = category.parse::<Category>() else {
                warn!("Skipping bridge row {} with unknown category '{}'", id, category);
                continue;
            };
            match serde_json::from_str::<serde_json::Value>(&record_json) {
                Ok(value) => {
                    if let Some(doc) = docs.get_mut(&category) {
                        doc.bridges.push(value);
                    }
                }
                Err(e) => warn!("Skipping corrupt bridge row {}: {}", id, e),
            }
        }

        Ok(docs)
    }

    async fn append(&self, category: Category, record: &BridgeRecord) -> Result<()> {
        let record_json = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO bridges (category, bridge, fingerprint, record_json, added_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(category.as_str())
        .bind(&record.bridge)
        .bind(&record.fingerprint)
        .bind(&record_json)
        .bind(&record.added_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
