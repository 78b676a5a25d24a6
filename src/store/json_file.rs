//! JSON file [`RecordStore`].
//!
//! Each category lives in its own file, `<dir>/<category>.json`, shaped as
//! `{ "bridges": [ { "bridge": "...", ... }, ... ] }`. Files are created
//! on first append. A missing or unparseable file reads as empty.
//!
//! Appends rewrite the whole file: read, push, write to a sibling temp
//! file, fsync, rename. An in-process lock serialises appends so two
//! writers never interleave their read-modify-write.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CategoryDocument, RecordStore};
use crate::models::{BridgeRecord, Category};

pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, category: Category) -> PathBuf {
        self.dir.join(format!("{}.json", category))
    }

    /// Creates the storage directory.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create store directory: {}", self.dir.display()))
    }
}

async fn read_document(path: &Path) -> CategoryDocument {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return CategoryDocument::default(),
        Err(e) => {
            warn!("Could not read {}: {}; treating as empty", path.display(), e);
            return CategoryDocument::default();
        }
    };

    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Corrupt bridge file {}: {}; treating as empty", path.display(), e);
            return CategoryDocument::default();
        }
    };

    let bridges = value
        .get("bridges")
        .and_then(|b| b.as_array())
        .cloned()
        .unwrap_or_default();
    CategoryDocument { bridges }
}

async fn write_document(path: &Path, doc: &CategoryDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read_all(&self) -> Result<BTreeMap<Category, CategoryDocument>> {
        let mut docs = BTreeMap::new();
        for category in Category::ALL {
            docs.insert(category, read_document(&self.path_for(category)).await);
        }
        Ok(docs)
    }

    async fn append(&self, category: Category, record: &BridgeRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create store directory: {}", self.dir.display()))?;

        let path = self.path_for(category);
        let mut doc = read_document(&path).await;
        doc.bridges.push(serde_json::to_value(record)?);
        write_document(&path, &doc).await?;

        debug!("Appended bridge to {}", path.display());
        Ok(())
    }
}
