//! Per-collection progress summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{
    available_to_learn, due_for_review, lessons, next_review_at, ItemGraph, ItemKind, Ladders,
    LearnableItem, MasteryLabel,
};

/// Item count for one mastery label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: MasteryLabel,
    pub count: usize,
}

/// Snapshot statistics for one kind's collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub kind: ItemKind,
    pub total: usize,
    /// Counts for every label, unstarted through tree.
    pub labels: Vec<LabelCount>,
    pub mastered: usize,
    pub due_now: usize,
    pub lessons: usize,
    pub learnable: usize,
    pub answers: u64,
    pub correct: u64,
    /// Share of answers that promoted; `None` before the first answer.
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
}

impl CollectionSummary {
    /// Summarize `items` (all of `kind`) at `now`.
    pub fn compute(
        kind: ItemKind,
        items: &[LearnableItem],
        graph: &ItemGraph<'_>,
        now: DateTime<Utc>,
        ladders: &Ladders,
    ) -> Self {
        let ladder = ladders.for_kind(kind);

        let labels = MasteryLabel::ALL
            .iter()
            .map(|label| LabelCount {
                label: *label,
                count: items
                    .iter()
                    .filter(|item| ladder.contains(item.stage()) && ladder.label(item.stage()) == *label)
                    .count(),
            })
            .collect();

        let answers: u64 = items.iter().map(|i| u64::from(i.progress.answers())).sum();
        let correct: u64 = items.iter().map(|i| u64::from(i.progress.correct_count)).sum();
        let accuracy = (answers > 0).then(|| correct as f64 / answers as f64);

        Self {
            kind,
            total: items.len(),
            labels,
            mastered: items.iter().filter(|i| ladder.is_mastered(i.stage())).count(),
            due_now: due_for_review(items, now, ladders).len(),
            lessons: lessons(items, ladders).len(),
            learnable: available_to_learn(items, graph, ladders).len(),
            answers,
            correct,
            accuracy,
            next_review_at: next_review_at(items, now),
        }
    }

    /// Count for one label.
    pub fn count(&self, label: MasteryLabel) -> usize {
        self.labels
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GradedStage;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_summary_counts() {
        let ladders = Ladders::default();

        let mut due = LearnableItem::radical("r-due", 1, "一", "one").with_stage(GradedStage::Plant);
        due.progress.unlocked_at = Some(now() - Duration::days(30));
        due.progress.next_review_at = Some(now() - Duration::hours(1));
        due.progress.correct_count = 3;
        due.progress.wrong_count = 1;

        let mut lesson = LearnableItem::radical("r-lesson", 1, "二", "two").with_stage(GradedStage::Seed);
        lesson.progress.unlocked_at = Some(now());

        let mut later =
            LearnableItem::radical("r-later", 1, "三", "three").with_stage(GradedStage::Sprout);
        later.progress.unlocked_at = Some(now() - Duration::days(2));
        later.progress.next_review_at = Some(now() + Duration::hours(5));
        later.progress.correct_count = 1;

        let items = vec![
            due,
            lesson,
            later,
            LearnableItem::radical("r-open", 1, "四", "four"),
            LearnableItem::radical("r-gated", 2, "五", "five"),
        ];
        let graph = ItemGraph::new(1);
        let summary = CollectionSummary::compute(ItemKind::Radical, &items, &graph, now(), &ladders);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.count(MasteryLabel::Unstarted), 2);
        assert_eq!(summary.count(MasteryLabel::Plant), 1);
        assert_eq!(summary.mastered, 1);
        assert_eq!(summary.due_now, 1);
        assert_eq!(summary.lessons, 1);
        assert_eq!(summary.learnable, 1);
        assert_eq!(summary.answers, 5);
        assert_eq!(summary.correct, 4);
        assert_eq!(summary.accuracy, Some(0.8));
        assert_eq!(summary.next_review_at, Some(now() + Duration::hours(5)));
    }

    #[test]
    fn test_empty_summary() {
        let ladders = Ladders::default();
        let summary =
            CollectionSummary::compute(ItemKind::Word, &[], &ItemGraph::new(1), now(), &ladders);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.accuracy, None);
        assert_eq!(summary.labels.len(), 6);
        assert!(summary.labels.iter().all(|c| c.count == 0));
        assert_eq!(summary.count(MasteryLabel::Seed), 0);
    }
}
