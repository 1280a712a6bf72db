//! XP events and the append-only ledger.
//!
//! The engine computes XP deltas; this module is the collaborator that
//! accumulates them. Events are stored in an append-only JSONL file
//! (`~/.seedbed/xp.log`), one line per awarded delta.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ItemKind;
use crate::error::{Result, SeedbedError};

/// Schema version for XP events.
///
/// Increment when the event schema changes in a breaking way.
pub const XP_SCHEMA_VERSION: u8 = 1;

/// One XP delta, as written to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct XpEvent {
    /// Schema version for forward compatibility.
    pub v: u8,
    /// When the answer that earned the delta was given.
    pub ts: DateTime<Utc>,
    pub user_id: String,
    /// Course or collection the item belongs to.
    pub collection_id: String,
    pub kind: ItemKind,
    pub item_id: String,
    pub xp_delta: u32,
}

impl XpEvent {
    pub fn new(
        user_id: impl Into<String>,
        collection_id: impl Into<String>,
        kind: ItemKind,
        item_id: impl Into<String>,
        xp_delta: u32,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            v: XP_SCHEMA_VERSION,
            ts,
            user_id: user_id.into(),
            collection_id: collection_id.into(),
            kind,
            item_id: item_id.into(),
            xp_delta,
        }
    }
}

/// Running totals keyed by `(user_id, collection_id)`.
pub type XpTotals = BTreeMap<(String, String), u64>;

fn accumulate<'a>(events: impl IntoIterator<Item = &'a XpEvent>) -> XpTotals {
    let mut totals = XpTotals::new();
    for event in events {
        *totals
            .entry((event.user_id.clone(), event.collection_id.clone()))
            .or_default() += u64::from(event.xp_delta);
    }
    totals
}

/// Destination for XP deltas.
pub trait XpSink: Send + Sync {
    /// Record one delta.
    fn record(&self, event: &XpEvent) -> Result<()>;

    /// Every recorded event, oldest first.
    fn events(&self) -> Result<Vec<XpEvent>>;

    /// Running total for one user and collection.
    fn total(&self, user_id: &str, collection_id: &str) -> Result<u64> {
        Ok(self
            .events()?
            .iter()
            .filter(|e| e.user_id == user_id && e.collection_id == collection_id)
            .map(|e| u64::from(e.xp_delta))
            .sum())
    }

    /// Running totals for every user and collection.
    fn totals(&self) -> Result<XpTotals> {
        Ok(accumulate(&self.events()?))
    }
}

/// JSONL ledger of XP events.
#[derive(Debug, Clone)]
pub struct XpLedger {
    path: PathBuf,
}

impl XpLedger {
    /// Create a ledger writing to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append an event to the log.
    pub fn append(&self, event: &XpEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SeedbedError::storage(parent, e))?;
        }

        let json = serde_json::to_string(event)
            .map_err(|e| SeedbedError::serde(format!("Failed to serialize XP event: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SeedbedError::storage(&self.path, e))?;

        writeln!(file, "{}", json).map_err(|e| SeedbedError::storage(&self.path, e))?;

        Ok(())
    }

    /// Read all events from the log.
    pub fn read_all(&self) -> Result<Vec<XpEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| SeedbedError::storage(&self.path, e))?;

        let mut events = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let event: XpEvent = serde_json::from_str(line).map_err(|e| {
                SeedbedError::serde(format!(
                    "Failed to parse XP event on line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// Number of events in the log.
    pub fn count(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| SeedbedError::storage(&self.path, e))?;

        Ok(content.lines().filter(|l| !l.trim().is_empty()).count())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl XpSink for XpLedger {
    fn record(&self, event: &XpEvent) -> Result<()> {
        self.append(event)
    }

    fn events(&self) -> Result<Vec<XpEvent>> {
        self.read_all()
    }
}

/// In-memory XP sink.
#[derive(Debug, Default)]
pub struct MemoryXpSink {
    events: RwLock<Vec<XpEvent>>,
}

impl MemoryXpSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl XpSink for MemoryXpSink {
    fn record(&self, event: &XpEvent) -> Result<()> {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn events(&self) -> Result<Vec<XpEvent>> {
        Ok(self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
