//! Progress tracker.
//!
//! `advance` turns one answer into a new item record. It is a pure function
//! of the record, the outcome, the ladder table and the caller's clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::item::LearnableItem;
use crate::core::ladder::{Ladders, Stage, Steps};
use crate::error::{Result, SeedbedError};

/// Four-way self-rating used by the flashcard and cloze flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Impossible,
}

/// The answer a learner gave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Graded self-rating.
    Rated(Difficulty),
    /// Binary check (character flow): right answer.
    Correct,
    /// Binary check (character flow): wrong answer.
    Incorrect,
}

impl Outcome {
    /// Which way the outcome moves the item.
    pub fn direction(&self) -> Direction {
        match self {
            Self::Rated(Difficulty::Easy | Difficulty::Medium) | Self::Correct => {
                Direction::Promote
            }
            Self::Rated(Difficulty::Hard | Difficulty::Impossible) | Self::Incorrect => {
                Direction::Demote
            }
        }
    }

    /// How many stages the outcome moves the item.
    pub fn step(&self, steps: &Steps) -> u8 {
        match self {
            Self::Rated(Difficulty::Easy) => steps.easy,
            Self::Rated(Difficulty::Medium) | Self::Correct => steps.correct,
            Self::Rated(Difficulty::Hard | Difficulty::Impossible) | Self::Incorrect => {
                steps.lapse
            }
        }
    }
}

impl From<Difficulty> for Outcome {
    fn from(difficulty: Difficulty) -> Self {
        Self::Rated(difficulty)
    }
}

impl From<bool> for Outcome {
    fn from(correct: bool) -> Self {
        if correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }
}

/// Promotion or demotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Promote,
    Demote,
}

/// A stage change produced by one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    pub direction: Direction,
}

impl Transition {
    pub fn is_promotion(&self) -> bool {
        self.direction == Direction::Promote
    }

    /// Whether the stage actually moved (false at the top or bottom of a ladder).
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Result of advancing an item.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// The updated record. The caller persists it.
    pub item: LearnableItem,
    pub transition: Transition,
}

/// Apply one answer to an item.
///
/// - Promote outcomes move up by the configured step (two for `easy`, one
///   otherwise), capped at the terminal stage.
/// - Demote outcomes move down by the lapse step, never below the first
///   active stage.
/// - `next_review_at` becomes `now + interval(new stage)`.
/// - Exactly one of the two counters goes up.
///
/// Locked items must be unlocked first; advancing one is a precondition
/// violation. Records that fail validation are reported as corrupt.
pub fn advance(
    item: &LearnableItem,
    outcome: Outcome,
    now: DateTime<Utc>,
    ladders: &Ladders,
) -> Result<Advance> {
    let ladder = ladders.for_kind(item.kind());
    item.validate(ladder)?;

    let from = item.stage();
    if ladder.is_locked(from) {
        return Err(SeedbedError::precondition(format!(
            "cannot answer locked {} {}; unlock it first",
            item.kind(),
            item.id
        )));
    }

    let direction = outcome.direction();
    let step = outcome.step(&ladder.steps());
    let to = match direction {
        Direction::Promote => ladder.promote(from, step),
        Direction::Demote => ladder.demote(from, step),
    };

    let mut next = item.clone();
    next.progress.stage = to;
    next.progress.next_review_at = Some(now + ladder.interval_for(to));
    next.progress.last_reviewed_at = Some(now);
    match direction {
        Direction::Promote => {
            next.progress.correct_count = next.progress.correct_count.saturating_add(1)
        }
        Direction::Demote => next.progress.wrong_count = next.progress.wrong_count.saturating_add(1),
    }

    tracing::debug!(
        id = %item.id,
        kind = %item.kind(),
        from = %ladder.stage_name(from),
        to = %ladder.stage_name(to),
        "advanced item"
    );

    Ok(Advance {
        item: next,
        transition: Transition {
            from,
            to,
            direction,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemKind;
    use crate::core::ladder::GradedStage;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn word_at(level: u8) -> LearnableItem {
        let mut word = LearnableItem::word("w-1", "perro", "dog").with_stage(Stage(level));
        if level > 0 {
            word.progress.next_review_at = Some(now());
        }
        word
    }

    fn unlocked_radical(stage: GradedStage) -> LearnableItem {
        let mut radical = LearnableItem::radical("r-1", 1, "一", "ground").with_stage(stage);
        radical.progress.unlocked_at = Some(now() - Duration::days(3));
        radical
    }

    #[test]
    fn test_outcome_directions() {
        assert_eq!(Outcome::from(Difficulty::Easy).direction(), Direction::Promote);
        assert_eq!(Outcome::from(Difficulty::Medium).direction(), Direction::Promote);
        assert_eq!(Outcome::from(Difficulty::Hard).direction(), Direction::Demote);
        assert_eq!(Outcome::from(Difficulty::Impossible).direction(), Direction::Demote);
        assert_eq!(Outcome::from(true).direction(), Direction::Promote);
        assert_eq!(Outcome::from(false).direction(), Direction::Demote);
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_string(&Outcome::Rated(Difficulty::Hard)).unwrap();
        assert_eq!(json, r#"{"rated":"hard"}"#);
        let json = serde_json::to_string(&Outcome::Correct).unwrap();
        assert_eq!(json, r#""correct""#);
    }

    #[test]
    fn test_word_easy_promotes_by_two() {
        let ladders = Ladders::default();
        let advance = advance(&word_at(3), Difficulty::Easy.into(), now(), &ladders).unwrap();

        assert_eq!(advance.item.stage(), Stage(5));
        assert_eq!(advance.transition.from, Stage(3));
        assert_eq!(advance.transition.to, Stage(5));
        assert!(advance.transition.is_promotion());
        assert_eq!(advance.item.progress.correct_count, 1);
        assert_eq!(advance.item.progress.wrong_count, 0);
    }

    #[test]
    fn test_word_impossible_demotes_by_one() {
        let ladders = Ladders::default();
        let advance = advance(&word_at(3), Difficulty::Impossible.into(), now(), &ladders).unwrap();

        assert_eq!(advance.item.stage(), Stage(2));
        assert!(!advance.transition.is_promotion());
        assert_eq!(advance.item.progress.wrong_count, 1);
        assert_eq!(advance.item.progress.correct_count, 0);
    }

    #[test]
    fn test_word_never_below_level_one() {
        let ladders = Ladders::default();
        let advance = advance(&word_at(1), Difficulty::Hard.into(), now(), &ladders).unwrap();
        assert_eq!(advance.item.stage(), Stage(1));
        assert!(!advance.transition.changed());
    }

    #[test]
    fn test_new_word_enters_review_cycle() {
        let ladders = Ladders::default();

        let promoted = advance(&word_at(0), Difficulty::Medium.into(), now(), &ladders).unwrap();
        assert_eq!(promoted.item.stage(), Stage(1));

        let lapsed = advance(&word_at(0), Difficulty::Impossible.into(), now(), &ladders).unwrap();
        assert_eq!(lapsed.item.stage(), Stage(1));
        assert!(lapsed.item.progress.next_review_at.is_some());
    }

    #[test]
    fn test_next_review_uses_new_stage_interval() {
        let ladders = Ladders::default();
        let advance = advance(
            &unlocked_radical(GradedStage::Seed),
            Outcome::Correct,
            now(),
            &ladders,
        )
        .unwrap();

        assert_eq!(advance.item.stage(), GradedStage::Sprout.into());
        assert_eq!(
            advance.item.progress.next_review_at,
            Some(now() + ladders.interval_for(ItemKind::Radical, GradedStage::Sprout.into()))
        );
        assert_eq!(advance.item.progress.last_reviewed_at, Some(now()));
    }

    #[test]
    fn test_tree_stays_tree() {
        let ladders = Ladders::default();
        let mut tree = unlocked_radical(GradedStage::Tree);
        tree.progress.next_review_at = Some(now());

        let advance = advance(&tree, Outcome::Correct, now(), &ladders).unwrap();
        assert_eq!(advance.item.stage(), GradedStage::Tree.into());
        assert!(advance.transition.is_promotion());
        assert!(!advance.transition.changed());
    }

    #[test]
    fn test_unlocked_at_untouched() {
        let ladders = Ladders::default();
        let radical = unlocked_radical(GradedStage::Sprout);
        let advance = advance(&radical, Outcome::Incorrect, now(), &ladders).unwrap();
        assert_eq!(advance.item.progress.unlocked_at, radical.progress.unlocked_at);
    }

    #[test]
    fn test_locked_item_is_precondition_error() {
        let ladders = Ladders::default();
        let locked = LearnableItem::radical("r-1", 1, "一", "ground");

        let err = advance(&locked, Outcome::Correct, now(), &ladders).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_out_of_range_stage_is_corrupt() {
        let ladders = Ladders::default();
        let broken = unlocked_radical(GradedStage::Seed).with_stage(Stage(42));

        let err = advance(&broken, Outcome::Correct, now(), &ladders).unwrap_err();
        assert!(matches!(err, SeedbedError::CorruptRecord { .. }));
    }

    #[test]
    fn test_input_record_not_mutated() {
        let ladders = Ladders::default();
        let word = word_at(2);
        let before = word.clone();
        let _ = advance(&word, Difficulty::Easy.into(), now(), &ladders).unwrap();
        assert_eq!(word, before);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_outcome() -> impl Strategy<Value = Outcome> {
            prop_oneof![
                Just(Outcome::Rated(Difficulty::Easy)),
                Just(Outcome::Rated(Difficulty::Medium)),
                Just(Outcome::Rated(Difficulty::Hard)),
                Just(Outcome::Rated(Difficulty::Impossible)),
                Just(Outcome::Correct),
                Just(Outcome::Incorrect),
            ]
        }

        proptest! {
            // Property: counters sum to the number of answers
            #[test]
            fn prop_counters_track_answers(outcomes in prop::collection::vec(arb_outcome(), 0..40)) {
                let ladders = Ladders::default();
                let mut item = word_at(0);
                for outcome in &outcomes {
                    item = advance(&item, *outcome, now(), &ladders).unwrap().item;
                }
                prop_assert_eq!(item.progress.answers() as usize, outcomes.len());
            }

            // Property: an unlocked item never goes back to locked
            #[test]
            fn prop_no_relock(outcomes in prop::collection::vec(arb_outcome(), 1..40)) {
                let ladders = Ladders::default();
                let ladder = ladders.for_kind(ItemKind::Kanji);
                let mut item = unlocked_radical(GradedStage::Seed);
                for outcome in &outcomes {
                    item = advance(&item, *outcome, now(), &ladders).unwrap().item;
                    prop_assert!(!ladder.is_locked(item.stage()));
                    prop_assert!(ladder.is_active(item.stage()));
                }
            }

            // Property: the next review is always strictly after now
            #[test]
            fn prop_next_review_in_future(
                outcomes in prop::collection::vec(arb_outcome(), 1..20),
                offset_minutes in 0i64..1_000_000,
            ) {
                let ladders = Ladders::default();
                let clock = now() + Duration::minutes(offset_minutes);
                let mut item = word_at(0);
                for outcome in &outcomes {
                    item = advance(&item, *outcome, clock, &ladders).unwrap().item;
                    let due = item.progress.next_review_at.unwrap();
                    prop_assert!(due > clock);
                }
            }

            // Property: demoting at the first active stage stays put
            #[test]
            fn prop_demotion_floor(demote in prop_oneof![
                Just(Outcome::Incorrect),
                Just(Outcome::Rated(Difficulty::Hard)),
                Just(Outcome::Rated(Difficulty::Impossible)),
            ]) {
                let ladders = Ladders::default();
                let seed = unlocked_radical(GradedStage::Seed);
                let next = advance(&seed, demote, now(), &ladders).unwrap();
                prop_assert_eq!(next.item.stage(), Stage::from(GradedStage::Seed));
            }
        }
    }
}
