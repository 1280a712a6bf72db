//! Queue commands for Seedbed.
//!
//! Lists the review queue (due now), the learn queue (locked or new items
//! whose gates are open), and the lesson queue (unlocked, never answered).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::core::{
    available_to_learn, due_for_review, lessons, next_review_at, ItemKind, Ladders, LearnableItem,
};
use crate::error::Result;
use crate::review::Snapshot;
use crate::storage::ItemStore;

/// Which queue to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
    Due,
    Learn,
    Lessons,
}

impl Queue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Learn => "learn",
            Self::Lessons => "lessons",
        }
    }
}

/// Options for the queue commands.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    pub kind: ItemKind,
    /// Clock for due checks.
    pub now: DateTime<Utc>,
    /// Pin the active level instead of deriving it.
    pub level: Option<u32>,
    /// Maximum number of entries.
    pub limit: Option<usize>,
}

/// One queued item.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub id: String,
    pub level: u32,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    fn from_item(item: &LearnableItem, ladders: &Ladders) -> Self {
        Self {
            id: item.id.clone(),
            level: item.level,
            stage: ladders.for_kind(item.kind()).stage_name(item.stage()),
            written: item.written_form().map(str::to_owned),
            next_review_at: item.progress.next_review_at,
        }
    }
}

/// Output format for the queue commands.
#[derive(Debug, Clone, Serialize)]
pub struct QueueOutput {
    pub success: bool,
    pub queue: Queue,
    pub kind: ItemKind,
    pub active_level: u32,
    /// Size of the queue before `limit`.
    pub total: usize,
    pub items: Vec<QueueEntry>,
    /// Earliest upcoming review, for "nothing due" displays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueOutput {
    fn failure(queue: Queue, kind: ItemKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            queue,
            kind,
            active_level: 0,
            total: 0,
            items: Vec::new(),
            next_review_at: None,
            error: Some(error.into()),
        }
    }
}

/// The queue command implementation.
pub struct QueueCommand<S: ItemStore> {
    store: S,
    config: Config,
}

impl<S: ItemStore> QueueCommand<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// List one queue.
    pub fn run(&self, queue: Queue, options: &QueueOptions) -> QueueOutput {
        match self.collect(queue, options) {
            Ok(output) => output,
            Err(e) => QueueOutput::failure(queue, options.kind, e.to_string()),
        }
    }

    fn collect(&self, queue: Queue, options: &QueueOptions) -> Result<QueueOutput> {
        let ladders = Ladders::from_config(&self.config)?;
        let snapshot = Snapshot::load(&self.store)?;
        let kind = options.kind;
        let active_level = options.level.unwrap_or_else(|| {
            snapshot.active_level(
                kind.shape(),
                &ladders,
                self.config.unlock.level_up_threshold,
            )
        });
        let graph = snapshot.graph(active_level);
        let items = snapshot.items(kind);

        let selected = match queue {
            Queue::Due => due_for_review(items, options.now, &ladders),
            Queue::Learn => available_to_learn(items, &graph, &ladders),
            Queue::Lessons => lessons(items, &ladders),
        };
        let total = selected.len();
        let entries = selected
            .into_iter()
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|item| QueueEntry::from_item(item, &ladders))
            .collect();

        Ok(QueueOutput {
            success: true,
            queue,
            kind,
            active_level,
            total,
            items: entries,
            next_review_at: next_review_at(items, options.now),
            error: None,
        })
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &QueueOutput, options: &QueueOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output, options.now)
        }
    }

    fn format_human_readable(&self, output: &QueueOutput, now: DateTime<Utc>) -> String {
        if !output.success {
            return format!(
                "Failed to list {} queue: {}\n",
                output.queue.as_str(),
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut out = String::new();
        if output.items.is_empty() {
            out.push_str(&format!(
                "No {} items in the {} queue (level {}).\n",
                output.kind,
                output.queue.as_str(),
                output.active_level
            ));
            if let Some(next) = output.next_review_at {
                out.push_str(&format!("Next review {}.\n", relative(next, now)));
            }
            return out;
        }

        out.push_str(&format!(
            "{} {} items in the {} queue (level {}):\n",
            output.total,
            output.kind,
            output.queue.as_str(),
            output.active_level
        ));
        for entry in &output.items {
            let written = entry.written.as_deref().unwrap_or("");
            out.push_str(&format!(
                "  {:<16} {:<6} L{:<3} {}\n",
                entry.id, written, entry.level, entry.stage
            ));
        }
        if output.items.len() < output.total {
            out.push_str(&format!("  ... and {} more\n", output.total - output.items.len()));
        }
        out
    }
}

/// "in 3h" / "in 2d" style offset.
pub(crate) fn relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = at - now;
    if delta.num_days() >= 1 {
        format!("in {}d", delta.num_days())
    } else if delta.num_hours() >= 1 {
        format!("in {}h", delta.num_hours())
    } else if delta.num_minutes() >= 1 {
        format!("in {}m", delta.num_minutes())
    } else {
        "now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GradedStage, Stage};
    use crate::storage::MemoryItemStore;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn options(kind: ItemKind) -> QueueOptions {
        QueueOptions {
            json: false,
            quiet: false,
            kind,
            now: now(),
            level: None,
            limit: None,
        }
    }

    fn scheduled_word(id: &str, level: u8, due: DateTime<Utc>) -> LearnableItem {
        let mut word = LearnableItem::word(id, id, "meaning").with_stage(Stage(level));
        word.progress.next_review_at = Some(due);
        word
    }

    fn setup() -> Arc<MemoryItemStore> {
        let store = Arc::new(MemoryItemStore::new());
        store
            .save(
                ItemKind::Word,
                &[
                    scheduled_word("w-due", 2, now() - Duration::hours(1)),
                    scheduled_word("w-later", 4, now() + Duration::hours(3)),
                    LearnableItem::word("w-new", "nuevo", "new"),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_due_queue() {
        let cmd = QueueCommand::new(setup(), Config::default());
        let output = cmd.run(Queue::Due, &options(ItemKind::Word));

        assert!(output.success);
        assert_eq!(output.total, 1);
        assert_eq!(output.items[0].id, "w-due");
        assert_eq!(output.items[0].stage, "level 2");
        assert_eq!(output.next_review_at, Some(now() + Duration::hours(3)));
    }

    #[test]
    fn test_learn_queue() {
        let cmd = QueueCommand::new(setup(), Config::default());
        let output = cmd.run(Queue::Learn, &options(ItemKind::Word));
        let ids: Vec<&str> = output.items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["w-new"]);
        assert_eq!(output.items[0].stage, "new");
    }

    #[test]
    fn test_lessons_queue() {
        let store = Arc::new(MemoryItemStore::new());
        let mut radical = LearnableItem::radical("r-1", 1, "一", "one").with_stage(GradedStage::Seed);
        radical.progress.unlocked_at = Some(now());
        store.save(ItemKind::Radical, &[radical]).unwrap();

        let cmd = QueueCommand::new(store, Config::default());
        let output = cmd.run(Queue::Lessons, &options(ItemKind::Radical));
        assert_eq!(output.total, 1);
        assert_eq!(output.items[0].stage, "seed");
    }

    #[test]
    fn test_limit_and_format() {
        let store = Arc::new(MemoryItemStore::new());
        let words: Vec<LearnableItem> = (0..5)
            .map(|i| scheduled_word(&format!("w-{}", i), 1, now() - Duration::minutes(i)))
            .collect();
        store.save(ItemKind::Word, &words).unwrap();

        let cmd = QueueCommand::new(store, Config::default());
        let mut opts = options(ItemKind::Word);
        opts.limit = Some(2);
        let output = cmd.run(Queue::Due, &opts);
        assert_eq!(output.total, 5);
        assert_eq!(output.items.len(), 2);
        assert_eq!(output.items[0].id, "w-4");

        let text = cmd.format_output(&output, &opts);
        assert!(text.contains("5 word items in the due queue"));
        assert!(text.contains("... and 3 more"));
    }

    #[test]
    fn test_format_empty_shows_next_review() {
        let cmd = QueueCommand::new(setup(), Config::default());
        let opts = QueueOptions {
            now: now() - Duration::hours(2),
            ..options(ItemKind::Word)
        };
        let output = cmd.run(Queue::Due, &opts);
        let text = cmd.format_output(&output, &opts);
        assert!(text.contains("No word items"));
        assert!(text.contains("Next review in 1h"));
    }

    #[test]
    fn test_format_json_and_quiet() {
        let cmd = QueueCommand::new(setup(), Config::default());
        let mut opts = options(ItemKind::Word);
        let output = cmd.run(Queue::Due, &opts);

        opts.json = true;
        let json: serde_json::Value = serde_json::from_str(&cmd.format_output(&output, &opts)).unwrap();
        assert_eq!(json["queue"], "due");
        assert_eq!(json["kind"], "word");
        assert_eq!(json["items"][0]["id"], "w-due");

        opts.quiet = true;
        assert!(cmd.format_output(&output, &opts).is_empty());
    }

    #[test]
    fn test_invalid_config_is_failure() {
        let mut config = Config::default();
        config.scheduling.easy_step = 0;
        let cmd = QueueCommand::new(setup(), config);
        let output = cmd.run(Queue::Due, &options(ItemKind::Word));
        assert!(!output.success);
        assert!(output.error.is_some());
    }

    #[test]
    fn test_relative() {
        assert_eq!(relative(now() + Duration::days(2), now()), "in 2d");
        assert_eq!(relative(now() + Duration::minutes(90), now()), "in 1h");
        assert_eq!(relative(now() + Duration::seconds(10), now()), "now");
    }
}
