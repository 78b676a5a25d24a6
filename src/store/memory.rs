//! In-memory [`RecordStore`] for tests and in-process use.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`. Nothing survives the
//! process.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{CategoryDocument, RecordStore};
use crate::models::{BridgeRecord, Category};

pub struct InMemoryStore {
    docs: RwLock<BTreeMap<Category, Vec<serde_json::Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seeds raw entries for a category, bypassing [`RecordStore::append`].
    pub fn seed(&self, category: Category, entries: Vec<serde_json::Value>) {
        self.docs
            .write()
            .unwrap()
            .entry(category)
            .or_default()
            .extend(entries);
    }

    /// The stored `bridge` lines of one category, in append order.
    pub fn lines(&self, category: Category) -> Vec<String> {
        self.docs
            .read()
            .unwrap()
            .get(&category)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("bridge").and_then(|b| b.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn read_all(&self) -> Result<BTreeMap<Category, CategoryDocument>> {
        let docs = self.docs.read().unwrap();
        Ok(Category::ALL
            .iter()
            .map(|c| {
                let bridges = docs.get(c).cloned().unwrap_or_default();
                (*c, CategoryDocument { bridges })
            })
            .collect())
    }

    async fn append(&self, category: Category, record: &BridgeRecord) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.docs
            .write()
            .unwrap()
            .entry(category)
            .or_default()
            .push(value);
        Ok(())
    }
}
