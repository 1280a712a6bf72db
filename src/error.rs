//! Unified error types for Seedbed.
//!
//! The engine's own error surface is narrow: every scheduling operation is
//! total over well-formed records. Errors fall into two groups:
//!
//! - **Item-fatal** errors (precondition violations, corrupt records, unknown
//!   ids) mean one item cannot be processed. A review session skips the item
//!   and continues.
//! - **Infrastructure** errors (storage, serialization, configuration) come
//!   from the collaborators around the engine and are surfaced unchanged.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::ItemKind;

/// The main error type for Seedbed operations.
#[derive(Error, Debug)]
pub enum SeedbedError {
    /// The calling flow asked for something that should not have been
    /// presentable (e.g. answering a locked item).
    #[error("precondition violated: {message}")]
    Precondition { message: String },

    /// An item record is malformed or out of range for its ladder.
    #[error("corrupt record {id}: {message}")]
    CorruptRecord { id: String, message: String },

    /// The requested item id is not in the supplied collection.
    #[error("{kind} item not found: {id}")]
    NotFound { kind: ItemKind, id: String },

    /// I/O errors from the item store or XP log.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading or validation errors.
    #[error("config error: {message}")]
    Config { message: String },
}

/// A specialized Result type for Seedbed operations.
pub type Result<T> = std::result::Result<T, SeedbedError>;

impl SeedbedError {
    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Create a corrupt record error.
    pub fn corrupt(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(kind: ItemKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error is a precondition violation in the calling flow.
    ///
    /// Unknown ids count: the caller presented an item that is not there.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. } | Self::NotFound { .. })
    }

    /// Whether this error only concerns a single item.
    ///
    /// Item-fatal errors should skip the item and keep the session going.
    /// Anything else must be surfaced to the caller.
    pub fn is_item_fatal(&self) -> bool {
        matches!(
            self,
            Self::Precondition { .. } | Self::CorruptRecord { .. } | Self::NotFound { .. }
        )
    }
}

impl From<io::Error> for SeedbedError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SeedbedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for skip-and-continue error handling.
///
/// A review flow treats item-fatal errors as "skip this item": log a warning
/// and carry on with a fallback value.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (skipping: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (skipping: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the Seedbed CLI.
pub mod exit_codes {
    /// The command completed.
    pub const SUCCESS: i32 = 0;

    /// The command failed (bad input, item-fatal error, storage failure).
    pub const ERROR: i32 = 1;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}
