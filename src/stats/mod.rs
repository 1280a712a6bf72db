//! Progress tracking for Seedbed.
//!
//! XP deltas computed by the engine are accumulated in an append-only JSONL
//! ledger (`~/.seedbed/xp.log`). Collection summaries are derived on demand
//! from item snapshots.

pub mod ledger;
pub mod summary;

pub use ledger::{MemoryXpSink, XpEvent, XpLedger, XpSink, XpTotals, XP_SCHEMA_VERSION};
pub use summary::{CollectionSummary, LabelCount};
