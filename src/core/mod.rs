//! The scheduling engine.
//!
//! Pure functions over item snapshots: ladders and stage movement, due-set
//! selection, prerequisite resolution, and XP mapping. Nothing in here does
//! I/O or reads the clock; every time-dependent call takes `now`.

pub mod item;
pub mod ladder;
pub mod resolver;
pub mod reward;
pub mod selector;
pub mod tracker;

pub use item::{ItemContent, ItemId, ItemKind, LearnableItem, Progress};
pub use ladder::{GradedStage, Ladder, LadderShape, Ladders, MasteryLabel, Stage, Steps};
pub use resolver::{
    active_level, is_gate_open, prerequisites_met, resolve_prerequisites, unlock, unlock_all,
    unlockable, ItemGraph,
};
pub use reward::xp_for;
pub use selector::{
    available_to_learn, due_for_review, due_forecast, lessons, next_review_at, ForecastBucket,
    MAX_FORECAST_BUCKETS,
};
pub use tracker::{advance, Advance, Difficulty, Direction, Outcome, Transition};
