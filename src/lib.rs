//! Seedbed - spaced repetition with prerequisite unlocking
//!
//! Seedbed schedules learning items on a fixed stage ladder, re-testing each
//! one just before it is likely to be forgotten, and opens higher-tier items
//! once the lower-tier items they are built from are mastered.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod review;
pub mod stats;
pub mod storage;

pub use config::Config;
pub use core::{
    advance, available_to_learn, due_for_review, unlock, unlockable, xp_for, ItemGraph, ItemKind,
    Ladders, LearnableItem, Outcome, Stage,
};
pub use error::{Result, SeedbedError};
pub use review::{AnswerReport, ReviewSession, Snapshot};
pub use stats::{CollectionSummary, XpLedger, XpSink};
pub use storage::{FileItemStore, ItemStore, MemoryItemStore};

// CLI commands
pub use cli::{AnswerCommand, QueueCommand, StatsCommand, UnlockCommand};
