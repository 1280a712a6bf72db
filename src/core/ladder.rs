//! The stage ladder.
//!
//! Both item families climb the same abstraction: a finite, ordered run of
//! `Stage` indices with a review interval and a mastery label per stage.
//!
//! - **Graded** ladders (radicals, kanji, vocabulary) have six stages:
//!   `locked → seed → sprout → seedling → plant → tree`.
//! - **Numeric** ladders (words, cloze sentences) have levels `0..=max_level`,
//!   where level 0 means "never reviewed". Each level projects onto a mastery
//!   label through fixed breakpoints.
//!
//! Stage 0 is the pre-active stage on both ladders (locked or new); stage 1
//! is the first active stage.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::{Config, GradedConfig, NumericConfig, SchedulingConfig};
use crate::core::item::ItemKind;
use crate::error::{Result, SeedbedError};

/// Position on a ladder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Stage(pub u8);

impl Stage {
    /// Where every item starts: locked on graded ladders, new on numeric ones.
    pub const INITIAL: Stage = Stage(0);

    /// The stage as a table index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named stages of the graded ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradedStage {
    Locked,
    Seed,
    Sprout,
    Seedling,
    Plant,
    Tree,
}

impl GradedStage {
    pub const ALL: [GradedStage; 6] = [
        GradedStage::Locked,
        GradedStage::Seed,
        GradedStage::Sprout,
        GradedStage::Seedling,
        GradedStage::Plant,
        GradedStage::Tree,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Seed => "seed",
            Self::Sprout => "sprout",
            Self::Seedling => "seedling",
            Self::Plant => "plant",
            Self::Tree => "tree",
        }
    }
}

impl From<GradedStage> for Stage {
    fn from(stage: GradedStage) -> Self {
        Stage(stage as u8)
    }
}

impl TryFrom<Stage> for GradedStage {
    type Error = SeedbedError;

    fn try_from(stage: Stage) -> Result<Self> {
        Self::ALL
            .get(stage.index())
            .copied()
            .ok_or_else(|| SeedbedError::precondition(format!("stage {} is not graded", stage)))
    }
}

impl fmt::Display for GradedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mastery bucket shared by both ladders.
///
/// The numeric ladder's "masteryLevel" (0-5) is this label's depth.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLabel {
    #[default]
    Unstarted,
    Seed,
    Sprout,
    Seedling,
    Plant,
    Tree,
}

impl MasteryLabel {
    pub const ALL: [MasteryLabel; 6] = [
        MasteryLabel::Unstarted,
        MasteryLabel::Seed,
        MasteryLabel::Sprout,
        MasteryLabel::Seedling,
        MasteryLabel::Plant,
        MasteryLabel::Tree,
    ];

    /// Depth 0 (unstarted) through 5 (tree).
    pub fn depth(&self) -> u8 {
        *self as u8
    }

    /// Label for a depth, saturating at `Tree`.
    pub fn from_depth(depth: u8) -> Self {
        Self::ALL
            .get(depth as usize)
            .copied()
            .unwrap_or(MasteryLabel::Tree)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Seed => "seed",
            Self::Sprout => "sprout",
            Self::Seedling => "seedling",
            Self::Plant => "plant",
            Self::Tree => "tree",
        }
    }
}

impl fmt::Display for MasteryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MasteryLabel {
    type Err = SeedbedError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.name() == s)
            .ok_or_else(|| SeedbedError::config(format!("unknown mastery label '{}'", s)))
    }
}

/// The two ladder shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderShape {
    Graded,
    Numeric,
}

impl fmt::Display for LadderShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graded => f.write_str("graded"),
            Self::Numeric => f.write_str("numeric"),
        }
    }
}

/// How far each outcome moves an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steps {
    /// Stages gained on an `easy` rating.
    pub easy: u8,
    /// Stages gained on `medium` or `correct`.
    pub correct: u8,
    /// Stages lost on any demoting outcome.
    pub lapse: u8,
}

impl From<&SchedulingConfig> for Steps {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            easy: config.easy_step,
            correct: config.correct_step,
            lapse: config.lapse_step,
        }
    }
}

/// One ladder: intervals, labels, and movement rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    shape: LadderShape,
    /// Review interval per stage. Pre-active stages hold zero.
    intervals: Vec<Duration>,
    /// Mastery label per stage.
    labels: Vec<MasteryLabel>,
    /// Lowest label that satisfies a prerequisite.
    mastery: MasteryLabel,
    steps: Steps,
}

impl Ladder {
    /// Build the graded ladder from configuration.
    pub fn graded(graded: &GradedConfig, scheduling: &SchedulingConfig) -> Self {
        let mut intervals = vec![Duration::zero()];
        intervals.extend(graded.intervals_hours.iter().map(|h| Duration::hours(*h as i64)));

        let labels = (0..intervals.len())
            .map(|i| MasteryLabel::from_depth(i.min(u8::MAX as usize) as u8))
            .collect();

        Self {
            shape: LadderShape::Graded,
            intervals,
            labels,
            mastery: scheduling.mastery_label,
            steps: scheduling.into(),
        }
    }

    /// Build the numeric ladder from configuration.
    pub fn numeric(numeric: &NumericConfig, scheduling: &SchedulingConfig) -> Self {
        let mut intervals = vec![Duration::zero()];
        intervals.extend(numeric.intervals_hours.iter().map(|h| Duration::hours(*h as i64)));

        // Label depth = number of breakpoints at or below the level.
        let labels = (0..intervals.len())
            .map(|level| {
                let depth = numeric
                    .label_breakpoints
                    .iter()
                    .filter(|bp| (**bp as usize) <= level)
                    .count();
                MasteryLabel::from_depth(depth.min(u8::MAX as usize) as u8)
            })
            .collect();

        Self {
            shape: LadderShape::Numeric,
            intervals,
            labels,
            mastery: scheduling.mastery_label,
            steps: scheduling.into(),
        }
    }

    pub fn shape(&self) -> LadderShape {
        self.shape
    }

    pub fn steps(&self) -> Steps {
        self.steps
    }

    /// Number of stages, including the pre-active one.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether `stage` is a valid index into this ladder.
    pub fn contains(&self, stage: Stage) -> bool {
        stage.index() < self.len()
    }

    /// The first stage with a review interval.
    pub fn first_active(&self) -> Stage {
        Stage(1)
    }

    /// The last stage.
    pub fn terminal(&self) -> Stage {
        Stage(self.len().saturating_sub(1).min(u8::MAX as usize) as u8)
    }

    /// Whether `stage` is the graded `locked` stage.
    pub fn is_locked(&self, stage: Stage) -> bool {
        self.shape == LadderShape::Graded && stage == Stage::INITIAL
    }

    /// Whether `stage` is the numeric `new` (level 0) stage.
    pub fn is_new(&self, stage: Stage) -> bool {
        self.shape == LadderShape::Numeric && stage == Stage::INITIAL
    }

    /// Locked or new: the item has not entered the review cycle.
    pub fn is_pre_active(&self, stage: Stage) -> bool {
        stage < self.first_active()
    }

    /// A valid stage that takes part in reviews.
    pub fn is_active(&self, stage: Stage) -> bool {
        self.contains(stage) && !self.is_pre_active(stage)
    }

    /// Review interval for an item that has just reached `stage`.
    ///
    /// Stages past the terminal are a caller bug; they get the terminal
    /// interval in release builds.
    pub fn interval_for(&self, stage: Stage) -> Duration {
        debug_assert!(self.contains(stage), "stage {} outside ladder", stage);
        self.intervals
            .get(stage.index())
            .or_else(|| self.intervals.last())
            .copied()
            .unwrap_or_else(Duration::zero)
    }

    /// Mastery label of `stage`.
    pub fn label(&self, stage: Stage) -> MasteryLabel {
        self.labels
            .get(stage.index())
            .or_else(|| self.labels.last())
            .copied()
            .unwrap_or_default()
    }

    /// Whether `stage` satisfies a prerequisite.
    pub fn is_mastered(&self, stage: Stage) -> bool {
        self.contains(stage) && self.label(stage) >= self.mastery
    }

    /// Move up `step` stages, capped at the terminal stage.
    pub fn promote(&self, stage: Stage, step: u8) -> Stage {
        Stage(stage.0.saturating_add(step).min(self.terminal().0))
    }

    /// Move down `step` stages, floored at the first active stage.
    ///
    /// A pre-active item lands on the first active stage: once answered,
    /// it is in the review cycle.
    pub fn demote(&self, stage: Stage, step: u8) -> Stage {
        Stage(stage.0.saturating_sub(step).max(self.first_active().0))
    }

    /// Human-readable stage name.
    pub fn stage_name(&self, stage: Stage) -> String {
        match self.shape {
            LadderShape::Graded => GradedStage::try_from(stage)
                .map(|s| s.name().to_string())
                .unwrap_or_else(|_| format!("stage {}", stage)),
            LadderShape::Numeric if stage == Stage::INITIAL => "new".to_string(),
            LadderShape::Numeric => format!("level {}", stage),
        }
    }
}

/// Per-kind ladder table.
#[derive(Debug, Clone, PartialEq)]
pub struct Ladders {
    table: [Ladder; 5],
}

impl Ladders {
    /// Validate the configuration and build the table.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &Config) -> Self {
        let graded = Ladder::graded(&config.graded, &config.scheduling);
        let numeric = Ladder::numeric(&config.numeric, &config.scheduling);
        let pick = |kind: ItemKind| match kind.shape() {
            LadderShape::Graded => graded.clone(),
            LadderShape::Numeric => numeric.clone(),
        };

        Self {
            table: ItemKind::ALL.map(pick),
        }
    }

    /// The ladder for a kind.
    pub fn for_kind(&self, kind: ItemKind) -> &Ladder {
        &self.table[kind.index()]
    }

    /// Review interval for `kind` at `stage`.
    pub fn interval_for(&self, kind: ItemKind, stage: Stage) -> Duration {
        self.for_kind(kind).interval_for(stage)
    }

    /// Whether `stage` counts toward satisfying a prerequisite for `kind`.
    pub fn is_mastered(&self, kind: ItemKind, stage: Stage) -> bool {
        self.for_kind(kind).is_mastered(stage)
    }
}

impl Default for Ladders {
    fn default() -> Self {
        Self::build(&Config::default())
    }
}
