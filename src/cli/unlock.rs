//! Unlock command for Seedbed.
//!
//! Opens one locked item, or every item of a kind whose gates are open.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{ItemKind, LearnableItem};
use crate::review::ReviewSession;
use crate::stats::XpSink;
use crate::storage::ItemStore;

/// Options for the unlock command.
#[derive(Debug, Clone)]
pub struct UnlockOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnlockedEntry {
    pub id: String,
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<String>,
}

impl From<&LearnableItem> for UnlockedEntry {
    fn from(item: &LearnableItem) -> Self {
        Self {
            id: item.id.clone(),
            level: item.level,
            written: item.written_form().map(str::to_owned),
        }
    }
}

/// Output format for the unlock command.
#[derive(Debug, Clone, Serialize)]
pub struct UnlockOutput {
    pub success: bool,
    pub kind: ItemKind,
    pub unlocked: Vec<UnlockedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnlockOutput {
    pub fn success(kind: ItemKind, unlocked: &[LearnableItem]) -> Self {
        Self {
            success: true,
            kind,
            unlocked: unlocked.iter().map(UnlockedEntry::from).collect(),
            error: None,
        }
    }

    pub fn failure(kind: ItemKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            kind,
            unlocked: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The unlock command implementation.
pub struct UnlockCommand<S: ItemStore, X: XpSink> {
    session: ReviewSession<S, X>,
}

impl<S: ItemStore, X: XpSink> UnlockCommand<S, X> {
    pub fn new(session: ReviewSession<S, X>) -> Self {
        Self { session }
    }

    /// Unlock `id`, or everything available when `id` is `None`.
    pub fn run(&self, kind: ItemKind, id: Option<&str>, options: &UnlockOptions) -> UnlockOutput {
        let result = match id {
            Some(id) => self.session.unlock(kind, id, options.now).map(|item| vec![item]),
            None => self.session.unlock_available(kind, options.now),
        };

        match result {
            Ok(unlocked) => UnlockOutput::success(kind, &unlocked),
            Err(e) => UnlockOutput::failure(kind, e.to_string()),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &UnlockOutput, options: &UnlockOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &UnlockOutput) -> String {
        if !output.success {
            return format!(
                "Unlock failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }
        if output.unlocked.is_empty() {
            return format!("No {} items ready to unlock.\n", output.kind);
        }

        let mut out = format!("Unlocked {} {} item(s):\n", output.unlocked.len(), output.kind);
        for entry in &output.unlocked {
            out.push_str(&format!(
                "  {:<16} {:<6} L{}\n",
                entry.id,
                entry.written.as_deref().unwrap_or(""),
                entry.level
            ));
        }
        out
    }
}
