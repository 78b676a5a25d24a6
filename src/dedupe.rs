//! Per-category deduplication against previously persisted lines.
//!
//! [`KnownSets`] is the working state for one run: seeded from storage,
//! grown as lines are accepted, dropped when the run ends.

use std::collections::{BTreeMap, HashSet};

use crate::models::{BridgeRecord, Category};
use crate::store::CategoryDocument;

/// Lines already known, per category.
pub type KnownSets = BTreeMap<Category, HashSet<String>>;

/// Anything that can be deduplicated: a category plus the identifying line.
pub trait Deduplicable {
    fn category(&self) -> Category;
    fn line(&self) -> &str;
}

impl Deduplicable for BridgeRecord {
    fn category(&self) -> Category {
        BridgeRecord::category(self)
    }

    fn line(&self) -> &str {
        &self.bridge
    }
}

/// Items split into first-seen and already-known, per category, input
/// order preserved within each group.
#[derive(Debug)]
pub struct Partition<T> {
    pub new: BTreeMap<Category, Vec<T>>,
    pub duplicate: BTreeMap<Category, Vec<T>>,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self {
            new: BTreeMap::new(),
            duplicate: BTreeMap::new(),
        }
    }
}

/// Builds the known sets from persisted documents.
///
/// Only string `bridge` fields count; entries without one are ignored.
/// Every category in `docs` gets a set, even an empty one.
pub fn known_sets_from_documents(docs: &BTreeMap<Category, CategoryDocument>) -> KnownSets {
    docs.iter()
        .map(|(category, doc)| {
            let set = doc.lines().map(|b| b.trim().to_string()).collect();
            (*category, set)
        })
        .collect()
}

/// Partitions `items` into new and duplicate per category.
///
/// Each accepted line is inserted into `known` immediately, so a later
/// repeat within the same call counts as a duplicate. Membership is by
/// trimmed line.
pub fn dedupe<T, I>(known: &mut KnownSets, items: I) -> Partition<T>
where
    T: Deduplicable,
    I: IntoIterator<Item = T>,
{
    let mut partition = Partition::default();

    for item in items {
        let category = item.category();
        let line = item.line().trim().to_string();
        let set = known.entry(category).or_default();

        if set.contains(&line) {
            partition.duplicate.entry(category).or_insert_with(Vec::new).push(item);
        } else {
            set.insert(line);
            partition.new.entry(category).or_insert_with(Vec::new).push(item);
        }
    }

    partition
}
