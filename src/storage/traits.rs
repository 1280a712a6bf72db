//! Item storage traits for Seedbed.
//!
//! This module defines the `ItemStore` trait: the load/save boundary the
//! engine's callers use to fetch a snapshot and write results back.

use std::sync::Arc;

use crate::core::{ItemKind, LearnableItem};
use crate::error::{Result, SeedbedError};

/// Trait for item storage backends.
///
/// Collections are scoped per kind and keyed by item id.
pub trait ItemStore: Send + Sync {
    /// Load every item of `kind`, ordered by id.
    ///
    /// Returns an empty collection if nothing has been saved yet.
    fn load(&self, kind: ItemKind) -> Result<Vec<LearnableItem>>;

    /// Upsert `items` into the `kind` collection by id.
    ///
    /// Items not mentioned are left untouched. Every item must be of `kind`.
    fn save(&self, kind: ItemKind, items: &[LearnableItem]) -> Result<()>;

    /// Retrieve one item.
    ///
    /// Returns `Ok(None)` if it doesn't exist.
    fn get(&self, kind: ItemKind, id: &str) -> Result<Option<LearnableItem>> {
        Ok(self.load(kind)?.into_iter().find(|item| item.id == id))
    }

    /// Retrieve one item, failing with `NotFound` if it doesn't exist.
    fn require(&self, kind: ItemKind, id: &str) -> Result<LearnableItem> {
        self.get(kind, id)?
            .ok_or_else(|| SeedbedError::not_found(kind, id))
    }
}

/// Reject items saved under the wrong kind.
pub(crate) fn check_kinds(kind: ItemKind, items: &[LearnableItem]) -> Result<()> {
    match items.iter().find(|item| item.kind() != kind) {
        Some(item) => Err(SeedbedError::precondition(format!(
            "cannot save {} item {} into the {} collection",
            item.kind(),
            item.id,
            kind
        ))),
        None => Ok(()),
    }
}

/// Blanket implementation of ItemStore for Arc-wrapped stores.
///
/// This allows sharing one store between a review session and the commands
/// that query it.
impl<T: ItemStore + ?Sized> ItemStore for Arc<T> {
    fn load(&self, kind: ItemKind) -> Result<Vec<LearnableItem>> {
        (**self).load(kind)
    }

    fn save(&self, kind: ItemKind, items: &[LearnableItem]) -> Result<()> {
        (**self).save(kind, items)
    }

    fn get(&self, kind: ItemKind, id: &str) -> Result<Option<LearnableItem>> {
        (**self).get(kind, id)
    }
}
