//! Answer command for Seedbed.
//!
//! Records one answer for one item: advances it, persists it, and reports
//! XP and anything that became learnable.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{ItemKind, Outcome};
use crate::review::{AnswerReport, ReviewSession};
use crate::stats::XpSink;
use crate::storage::ItemStore;

use super::queue::relative;

/// Options for the answer command.
#[derive(Debug, Clone)]
pub struct AnswerOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    pub now: DateTime<Utc>,
}

/// Output format for the answer command.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AnswerReport>,
    /// The error concerns this item only; a session would skip it.
    pub item_fatal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnswerOutput {
    pub fn success(report: AnswerReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            item_fatal: false,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, item_fatal: bool) -> Self {
        Self {
            success: false,
            report: None,
            item_fatal,
            error: Some(error.into()),
        }
    }
}

/// The answer command implementation.
pub struct AnswerCommand<S: ItemStore, X: XpSink> {
    session: ReviewSession<S, X>,
}

impl<S: ItemStore, X: XpSink> AnswerCommand<S, X> {
    pub fn new(session: ReviewSession<S, X>) -> Self {
        Self { session }
    }

    pub fn run(&self, kind: ItemKind, id: &str, outcome: Outcome, options: &AnswerOptions) -> AnswerOutput {
        match self.session.answer(kind, id, outcome, options.now) {
            Ok(report) => AnswerOutput::success(report),
            Err(e) => {
                if e.is_item_fatal() {
                    tracing::warn!(%kind, id, error = %e, "answer rejected");
                }
                AnswerOutput::failure(e.to_string(), e.is_item_fatal())
            }
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &AnswerOutput, options: &AnswerOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output, options.now)
        }
    }

    fn format_human_readable(&self, output: &AnswerOutput, now: DateTime<Utc>) -> String {
        let Some(report) = output.report.as_ref() else {
            return format!(
                "Answer failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        };

        let ladder = self.session.ladders().for_kind(report.kind);
        let verb = if report.transition.is_promotion() { "promoted" } else { "demoted" };
        let mut out = format!(
            "{} {}: {} {} -> {}",
            report.kind,
            report.id,
            verb,
            ladder.stage_name(report.transition.from),
            report.stage_name
        );
        if report.xp > 0 && report.xp_recorded {
            out.push_str(&format!(" (+{} xp)", report.xp));
        } else if report.xp > 0 {
            out.push_str(&format!(" (+{} xp, not recorded)", report.xp));
        }
        out.push('\n');

        if let Some(next) = report.next_review_at {
            out.push_str(&format!("Next review {}.\n", relative(next, now)));
        }
        if !report.newly_learnable.is_empty() {
            out.push_str(&format!(
                "Now learnable: {}\n",
                report.newly_learnable.join(", ")
            ));
        }
        out
    }
}
