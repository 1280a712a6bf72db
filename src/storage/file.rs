//! File-based item storage for Seedbed.
//!
//! Each kind is one JSON array in `~/.seedbed/items/<kind>.json`.
//! Atomic writes are achieved via temp file + rename pattern.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde_json::Value;

use crate::config::items_dir;
use crate::core::{ItemKind, LearnableItem};
use crate::error::{Result, SeedbedError};
use crate::storage::traits::check_kinds;
use crate::storage::ItemStore;

/// File-based item storage.
///
/// Records that fail to parse are skipped on load with a warning, and kept
/// verbatim on save so a bad record never takes its neighbours down with it.
#[derive(Debug, Clone)]
pub struct FileItemStore {
    /// Directory where collection files are stored.
    items_dir: PathBuf,
}

impl FileItemStore {
    /// Create a store in the default directory.
    ///
    /// Uses `~/.seedbed/items/` or `$SEEDBED_HOME/items/`.
    pub fn new() -> Result<Self> {
        let dir = items_dir().ok_or_else(|| {
            SeedbedError::config("Could not determine items directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a store in a custom directory.
    pub fn with_dir(items_dir: impl Into<PathBuf>) -> Result<Self> {
        let items_dir = items_dir.into();

        if !items_dir.exists() {
            fs::create_dir_all(&items_dir).map_err(|e| SeedbedError::storage(&items_dir, e))?;
        }

        Ok(Self { items_dir })
    }

    fn collection_path(&self, kind: ItemKind) -> PathBuf {
        self.items_dir.join(format!("{}.json", kind.as_str()))
    }

    fn temp_path(&self, kind: ItemKind) -> PathBuf {
        self.items_dir.join(format!(".{}.json.tmp", kind.as_str()))
    }

    /// Read the raw records of a collection.
    fn read_records(&self, kind: ItemKind) -> Result<Vec<Value>> {
        let path = self.collection_path(kind);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).map_err(|e| SeedbedError::storage(&path, e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<Value> = serde_json::from_str(&content)?;
        Ok(records)
    }

    /// Write a collection atomically using temp file + rename.
    fn atomic_write(&self, kind: ItemKind, records: &[Value]) -> Result<()> {
        let final_path = self.collection_path(kind);
        let temp_path = self.temp_path(kind);

        let json = serde_json::to_string_pretty(records)?;

        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| SeedbedError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| SeedbedError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| SeedbedError::storage(&temp_path, e))?;
        }

        fs::rename(&temp_path, &final_path).map_err(|e| SeedbedError::storage(&final_path, e))?;

        Ok(())
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

impl ItemStore for FileItemStore {
    fn load(&self, kind: ItemKind) -> Result<Vec<LearnableItem>> {
        let mut items: Vec<LearnableItem> = Vec::new();

        for record in self.read_records(kind)? {
            match serde_json::from_value::<LearnableItem>(record) {
                Ok(item) if item.kind() == kind => items.push(item),
                Ok(item) => {
                    tracing::warn!(id = %item.id, "skipping {} record in {} collection", item.kind(), kind);
                }
                Err(e) => {
                    tracing::warn!(%kind, error = %e, "skipping unparseable record");
                }
            }
        }

        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    fn save(&self, kind: ItemKind, items: &[LearnableItem]) -> Result<()> {
        check_kinds(kind, items)?;

        let mut keyed: BTreeMap<String, Value> = BTreeMap::new();
        let mut orphans: Vec<Value> = Vec::new();
        for record in self.read_records(kind)? {
            match record_id(&record).map(str::to_owned) {
                Some(id) => {
                    keyed.insert(id, record);
                }
                None => orphans.push(record),
            }
        }

        for item in items {
            keyed.insert(item.id.clone(), serde_json::to_value(item)?);
        }

        let records: Vec<Value> = keyed.into_values().chain(orphans).collect();
        self.atomic_write(kind, &records)
    }
}
