//! Storage abstraction for harvested bridges.
//!
//! The [`RecordStore`] trait covers the two operations the pipeline needs:
//! read every persisted record grouped by category, and append one record
//! to a category. Storage is append-only; records are never updated or
//! removed.
//!
//! Backends:
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | JSON files | [`json_file`] | one `<category>.json` per category (default) |
//! | SQLite | [`sqlite`] | single `bridges` table |
//! | In-memory | [`memory`] | tests and in-process use |

pub mod json_file;
pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::{BridgeRecord, Category};

pub use json_file::JsonFileStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Persisted records of one category, in append order.
///
/// Entries are kept as raw JSON so that hand-edited or older documents
/// still load; only the `bridge` field is relied on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryDocument {
    #[serde(default)]
    pub bridges: Vec<serde_json::Value>,
}

impl CategoryDocument {
    /// The `bridge` lines of every well-formed entry.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.bridges
            .iter()
            .filter_map(|entry| entry.get("bridge").and_then(|b| b.as_str()))
    }
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`read_all`](RecordStore::read_all) | Every category's document; unreadable ones come back empty |
/// | [`append`](RecordStore::append) | Durably add one record to a category |
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads every category.
    ///
    /// A missing or corrupt category document is returned as empty rather
    /// than failing the whole read.
    async fn read_all(&self) -> Result<BTreeMap<Category, CategoryDocument>>;

    /// Appends `record` to `category`. The write is durable once this
    /// returns `Ok`.
    async fn append(&self, category: Category, record: &BridgeRecord) -> Result<()>;
}

/// Opens the backend selected by `storage.backend`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    match config.storage.backend.as_str() {
        "json" => Ok(Arc::new(JsonFileStore::new(&config.storage.dir))),
        "sqlite" => Ok(Arc::new(SqliteStore::open(&config.storage.path).await?)),
        other => bail!(
            "Unknown storage backend: '{}'. Must be json or sqlite.",
            other
        ),
    }
}

/// Prepares the configured backend: creates the JSON directory or the
/// SQLite schema. Safe to run repeatedly.
pub async fn init_store(config: &Config) -> Result<()> {
    match config.storage.backend.as_str() {
        "json" => JsonFileStore::new(&config.storage.dir).init(),
        "sqlite" => {
            let store = SqliteStore::open(&config.storage.path).await?;
            store.close().await;
            Ok(())
        }
        other => bail!(
            "Unknown storage backend: '{}'. Must be json or sqlite.",
            other
        ),
    }
}
