//! Stats command for Seedbed.
//!
//! Per-kind progress summaries, the review forecast, and accumulated XP.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::core::{due_forecast, ForecastBucket, ItemKind, LadderShape, LearnableItem, MasteryLabel};
use crate::error::Result;
use crate::review::ReviewSession;
use crate::stats::{CollectionSummary, XpSink};
use crate::storage::ItemStore;

/// Options for the stats command.
#[derive(Debug, Clone)]
pub struct StatsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    pub now: DateTime<Utc>,
    /// Restrict to one kind.
    pub kind: Option<ItemKind>,
    /// Forecast window in days.
    pub forecast_days: u32,
}

/// Output format for the stats command.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOutput {
    pub success: bool,
    /// Active level of the graded family (radicals, kanji, vocabulary).
    pub graded_level: u32,
    /// Active level of the numeric family (words, sentences).
    pub numeric_level: u32,
    pub collections: Vec<CollectionSummary>,
    /// Reviews coming due per day.
    pub forecast: Vec<ForecastBucket>,
    pub xp_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatsOutput {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            graded_level: 0,
            numeric_level: 0,
            collections: Vec::new(),
            forecast: Vec::new(),
            xp_total: 0,
            error: Some(error.into()),
        }
    }
}

/// The stats command implementation.
pub struct StatsCommand<S: ItemStore, X: XpSink> {
    session: ReviewSession<S, X>,
}

impl<S: ItemStore, X: XpSink> StatsCommand<S, X> {
    pub fn new(session: ReviewSession<S, X>) -> Self {
        Self { session }
    }

    pub fn run(&self, options: &StatsOptions) -> StatsOutput {
        match self.collect(options) {
            Ok(output) => output,
            Err(e) => StatsOutput::failure(e.to_string()),
        }
    }

    fn collect(&self, options: &StatsOptions) -> Result<StatsOutput> {
        let snapshot = self.session.snapshot()?;
        let ladders = self.session.ladders();
        let kinds: Vec<ItemKind> = match options.kind {
            Some(kind) => vec![kind],
            None => ItemKind::ALL.to_vec(),
        };

        let collections = kinds
            .iter()
            .map(|kind| {
                let graph = snapshot.graph(self.session.level_for(&snapshot, *kind));
                CollectionSummary::compute(*kind, snapshot.items(*kind), &graph, options.now, ladders)
            })
            .collect();

        let scheduled: Vec<LearnableItem> = kinds
            .iter()
            .flat_map(|kind| snapshot.items(*kind).iter().cloned())
            .collect();
        let forecast = due_forecast(
            &scheduled,
            options.now,
            Duration::days(i64::from(options.forecast_days)),
            Duration::days(1),
        );

        Ok(StatsOutput {
            success: true,
            graded_level: self.session.level_for(&snapshot, ItemKind::Kanji),
            numeric_level: self.session.level_for(&snapshot, ItemKind::Word),
            collections,
            forecast,
            xp_total: self.session.xp_total()?,
            error: None,
        })
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StatsOutput, options: &StatsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &StatsOutput) -> String {
        if !output.success {
            return format!(
                "Failed to load stats: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut out = String::new();
        out.push_str(&format!(
            "Level {} (characters), level {} (words) | {} xp\n",
            output.graded_level, output.numeric_level, output.xp_total
        ));

        for summary in output.collections.iter().filter(|s| s.total > 0) {
            let family = match summary.kind.shape() {
                LadderShape::Graded => "graded",
                LadderShape::Numeric => "numeric",
            };
            out.push_str(&format!("\n{} ({}, {} items)\n", summary.kind, family, summary.total));
            let labels: Vec<String> = MasteryLabel::ALL
                .iter()
                .map(|label| format!("{} {}", label, summary.count(*label)))
                .collect();
            out.push_str(&format!("  {}\n", labels.join(" | ")));
            out.push_str(&format!(
                "  due {} | lessons {} | learnable {} | mastered {}\n",
                summary.due_now, summary.lessons, summary.learnable, summary.mastered
            ));
            if let Some(accuracy) = summary.accuracy {
                out.push_str(&format!(
                    "  accuracy {:.0}% over {} answers\n",
                    accuracy * 100.0,
                    summary.answers
                ));
            }
        }

        let upcoming: usize = output.forecast.iter().map(|b| b.count).sum();
        if upcoming > 0 {
            let days: Vec<String> = output.forecast.iter().map(|b| b.count.to_string()).collect();
            out.push_str(&format!("\nUpcoming reviews per day: {}\n", days.join(" ")));
        }

        out
    }
}
