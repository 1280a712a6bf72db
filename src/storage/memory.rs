//! In-memory item storage.
//!
//! Thread-safe implementation of the ItemStore trait, used by tests and by
//! callers that seed a collection without touching disk.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::core::{ItemId, ItemKind, LearnableItem};
use crate::error::Result;
use crate::storage::traits::check_kinds;
use crate::storage::ItemStore;

type Collection = BTreeMap<ItemId, LearnableItem>;

/// In-memory item store.
///
/// One id-ordered map per kind behind a `RwLock`. Contents are lost when the
/// store is dropped.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    collections: RwLock<HashMap<ItemKind, Collection>>,
}

impl MemoryItemStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-seeded with one collection.
    pub fn with_items(kind: ItemKind, items: impl IntoIterator<Item = LearnableItem>) -> Self {
        let collection: Collection = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        let mut collections = HashMap::new();
        collections.insert(kind, collection);
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Total number of items across all kinds.
    pub fn len(&self) -> usize {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        collections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all collections.
    pub fn clear(&self) {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ItemStore for MemoryItemStore {
    fn load(&self, kind: ItemKind) -> Result<Vec<LearnableItem>> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections
            .get(&kind)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn save(&self, kind: ItemKind, items: &[LearnableItem]) -> Result<()> {
        check_kinds(kind, items)?;
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let collection = collections.entry(kind).or_default();
        for item in items {
            collection.insert(item.id.clone(), item.clone());
        }
        Ok(())
    }

    fn get(&self, kind: ItemKind, id: &str) -> Result<Option<LearnableItem>> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(&kind).and_then(|c| c.get(id)).cloned())
    }
}
