//! Review flow.
//!
//! Ties the pure engine to its collaborators: load a snapshot from the item
//! store, apply `advance` or `unlock`, persist the result, and report XP.
//! Calls on one session must not interleave for the same item; the session
//! does no locking of its own.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{Config, RewardConfig};
use crate::core::{
    active_level, advance, available_to_learn, is_gate_open, unlock, unlock_all, xp_for, ItemGraph,
    ItemId, ItemKind, LadderShape, Ladders, LearnableItem, Outcome, Transition,
};
use crate::error::{Result, SeedbedError};
use crate::stats::{XpEvent, XpSink};
use crate::storage::ItemStore;

/// Every collection, loaded at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    collections: [Vec<LearnableItem>; 5],
}

impl Snapshot {
    /// Load every kind from `store`.
    pub fn load<S: ItemStore + ?Sized>(store: &S) -> Result<Self> {
        let mut snapshot = Self::default();
        for kind in ItemKind::ALL {
            snapshot.collections[kind.index()] = store.load(kind)?;
        }
        Ok(snapshot)
    }

    pub fn items(&self, kind: ItemKind) -> &[LearnableItem] {
        &self.collections[kind.index()]
    }

    pub fn find(&self, kind: ItemKind, id: &str) -> Result<&LearnableItem> {
        self.items(kind)
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| SeedbedError::not_found(kind, id))
    }

    /// Replace one item in place (or add it).
    pub fn replace(&mut self, item: LearnableItem) {
        let collection = &mut self.collections[item.kind().index()];
        match collection.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => collection.push(item),
        }
    }

    /// Active level of the items sharing `shape`.
    pub fn active_level(&self, shape: LadderShape, ladders: &Ladders, threshold: f64) -> u32 {
        let family = ItemKind::ALL
            .into_iter()
            .filter(|kind| kind.shape() == shape)
            .flat_map(|kind| self.items(kind));
        active_level(family, ladders, threshold)
    }

    /// Graph over every collection at `level`.
    pub fn graph(&self, level: u32) -> ItemGraph<'_> {
        ItemKind::ALL
            .iter()
            .fold(ItemGraph::new(level), |graph, kind| {
                graph.with_collection(*kind, self.items(*kind))
            })
    }
}

/// What one answer did.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerReport {
    pub kind: ItemKind,
    pub id: ItemId,
    pub transition: Transition,
    /// Stage name after the answer ("sprout", "level 4").
    pub stage_name: String,
    pub next_review_at: Option<DateTime<Utc>>,
    pub xp: u32,
    /// False when `xp` was owed but the sink failed to record it. The stage
    /// change is already saved either way.
    pub xp_recorded: bool,
    /// Dependent items that became learnable because of this answer.
    pub newly_learnable: Vec<ItemId>,
}

/// A learner's review session over one store.
pub struct ReviewSession<S: ItemStore, X: XpSink> {
    store: S,
    xp: X,
    ladders: Ladders,
    reward: RewardConfig,
    level_up_threshold: f64,
    level_override: Option<u32>,
    user_id: String,
    collection_id: String,
}

impl<S: ItemStore, X: XpSink> ReviewSession<S, X> {
    /// Create a session. Fails if the configuration is invalid.
    pub fn new(store: S, xp: X, config: &Config) -> Result<Self> {
        Ok(Self {
            store,
            xp,
            ladders: Ladders::from_config(config)?,
            reward: config.reward.clone(),
            level_up_threshold: config.unlock.level_up_threshold,
            level_override: None,
            user_id: "local".to_string(),
            collection_id: "default".to_string(),
        })
    }

    /// Attribute XP to a user and collection.
    pub fn with_identity(mut self, user_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self.collection_id = collection_id.into();
        self
    }

    /// Pin the active level instead of deriving it from progress.
    pub fn with_level(mut self, level: Option<u32>) -> Self {
        self.level_override = level;
        self
    }

    pub fn ladders(&self) -> &Ladders {
        &self.ladders
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn xp_sink(&self) -> &X {
        &self.xp
    }

    /// XP accumulated by this session's user in its collection.
    pub fn xp_total(&self) -> Result<u64> {
        self.xp.total(&self.user_id, &self.collection_id)
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::load(&self.store)
    }

    /// The level gating `kind` in `snapshot`.
    pub fn level_for(&self, snapshot: &Snapshot, kind: ItemKind) -> u32 {
        self.level_override.unwrap_or_else(|| {
            snapshot.active_level(kind.shape(), &self.ladders, self.level_up_threshold)
        })
    }

    /// Apply one answer and persist the result.
    ///
    /// A `new` numeric item can be answered directly, but only once its level
    /// and prerequisite gates are open. The item is saved before XP is
    /// recorded; an XP sink failure after that point is logged and reported
    /// through `AnswerReport::xp_recorded` instead of failing the answer, so a
    /// retry never applies the same answer twice.
    pub fn answer(
        &self,
        kind: ItemKind,
        id: &str,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<AnswerReport> {
        let mut snapshot = self.snapshot()?;
        let item = snapshot.find(kind, id)?;
        let ladder = self.ladders.for_kind(kind);
        if ladder.is_new(item.stage()) {
            let graph = snapshot.graph(self.level_for(&snapshot, kind));
            if !is_gate_open(item, &graph, &self.ladders) {
                return Err(SeedbedError::precondition(format!(
                    "{} {} is gated (level {} > {} or prerequisites not mastered)",
                    kind,
                    id,
                    item.level,
                    graph.active_level()
                )));
            }
        }
        let advanced = advance(item, outcome, now, &self.ladders)?;

        let learnable_before = self.learnable_dependents(&snapshot, kind);
        self.store.save(kind, std::slice::from_ref(&advanced.item))?;

        let xp = xp_for(kind, &advanced.transition, &self.ladders, &self.reward);
        let mut xp_recorded = true;
        if xp > 0 {
            let event = XpEvent::new(&self.user_id, &self.collection_id, kind, id, xp, now);
            if let Err(e) = self.xp.record(&event) {
                tracing::warn!(%kind, id, xp, error = %e, "answer saved but xp not recorded");
                xp_recorded = false;
            }
        }

        let report_item = advanced.item.clone();
        snapshot.replace(advanced.item);
        let newly_learnable = self
            .learnable_dependents(&snapshot, kind)
            .into_iter()
            .filter(|dependent| !learnable_before.contains(dependent))
            .collect();

        Ok(AnswerReport {
            kind,
            id: report_item.id,
            transition: advanced.transition,
            stage_name: ladder.stage_name(report_item.progress.stage),
            next_review_at: report_item.progress.next_review_at,
            xp,
            xp_recorded,
            newly_learnable,
        })
    }

    /// Unlock one item, enforcing level and prerequisite gates.
    pub fn unlock(&self, kind: ItemKind, id: &str, now: DateTime<Utc>) -> Result<LearnableItem> {
        let snapshot = self.snapshot()?;
        let item = snapshot.find(kind, id)?;
        let graph = snapshot.graph(self.level_for(&snapshot, kind));

        if !is_gate_open(item, &graph, &self.ladders) {
            return Err(SeedbedError::precondition(format!(
                "{} {} is gated (level {} > {} or prerequisites not mastered)",
                kind,
                id,
                item.level,
                graph.active_level()
            )));
        }

        let unlocked = unlock(item, now, &self.ladders)?;
        self.store.save(kind, std::slice::from_ref(&unlocked))?;
        Ok(unlocked)
    }

    /// Unlock everything of `kind` whose gates are open.
    pub fn unlock_available(&self, kind: ItemKind, now: DateTime<Utc>) -> Result<Vec<LearnableItem>> {
        let snapshot = self.snapshot()?;
        let graph = snapshot.graph(self.level_for(&snapshot, kind));
        let unlocked = unlock_all(snapshot.items(kind), &graph, now, &self.ladders)?;
        if !unlocked.is_empty() {
            self.store.save(kind, &unlocked)?;
        }
        Ok(unlocked)
    }

    fn learnable_dependents(&self, snapshot: &Snapshot, kind: ItemKind) -> Vec<ItemId> {
        let Some(dependent) = kind.dependent_kind() else {
            return Vec::new();
        };
        let graph = snapshot.graph(self.level_for(snapshot, dependent));
        available_to_learn(snapshot.items(dependent), &graph, &self.ladders)
            .into_iter()
            .map(|item| item.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GradedStage, Stage};
    use crate::error::FailOpen;
    use crate::stats::MemoryXpSink;
    use crate::storage::MemoryItemStore;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (Arc<MemoryItemStore>, ReviewSession<Arc<MemoryItemStore>, MemoryXpSink>) {
        let store = Arc::new(MemoryItemStore::new());
        let session = ReviewSession::new(Arc::clone(&store), MemoryXpSink::new(), &Config::default())
            .unwrap()
            .with_identity("ana", "kanji-course");
        (store, session)
    }

    fn radical_at(id: &str, character: &str, stage: GradedStage) -> LearnableItem {
        let mut radical = LearnableItem::radical(id, 1, character, id).with_stage(stage);
        radical.progress.unlocked_at = Some(now() - Duration::days(3));
        radical.progress.next_review_at = Some(now() - Duration::hours(1));
        radical
    }

    #[test]
    fn test_answer_persists_and_awards_xp() {
        let (store, session) = setup();
        store
            .save(ItemKind::Radical, &[radical_at("r-tree", "木", GradedStage::Seed)])
            .unwrap();

        let report = session
            .answer(ItemKind::Radical, "r-tree", Outcome::Correct, now())
            .unwrap();

        assert_eq!(report.transition.to, Stage::from(GradedStage::Sprout));
        assert_eq!(report.stage_name, "sprout");
        assert_eq!(report.xp, 2);
        assert!(report.xp_recorded);
        assert_eq!(report.next_review_at, Some(now() + Duration::hours(24)));

        let saved = store.require(ItemKind::Radical, "r-tree").unwrap();
        assert_eq!(saved.progress.correct_count, 1);
        assert_eq!(session.xp_sink().total("ana", "kanji-course").unwrap(), 2);
    }

    #[test]
    fn test_demotion_records_no_xp() {
        let (store, session) = setup();
        store
            .save(ItemKind::Radical, &[radical_at("r", "木", GradedStage::Plant)])
            .unwrap();

        let report = session
            .answer(ItemKind::Radical, "r", Outcome::Incorrect, now())
            .unwrap();
        assert_eq!(report.xp, 0);
        assert!(session.xp_sink().events().unwrap().is_empty());
    }

    #[test]
    fn test_answer_reports_newly_learnable_kanji() {
        let (store, session) = setup();
        store
            .save(
                ItemKind::Radical,
                &[
                    radical_at("r-tree", "木", GradedStage::Seedling),
                    radical_at("r-person", "亻", GradedStage::Sprout),
                ],
            )
            .unwrap();
        store
            .save(
                ItemKind::Kanji,
                &[LearnableItem::kanji("k-rest", 1, "休", "rest", ["木", "亻"])],
            )
            .unwrap();

        let session = session.with_level(Some(1));
        let report = session
            .answer(ItemKind::Radical, "r-person", Outcome::Correct, now())
            .unwrap();
        assert_eq!(report.newly_learnable, vec!["k-rest".to_string()]);

        let unlocked = session.unlock(ItemKind::Kanji, "k-rest", now()).unwrap();
        assert_eq!(unlocked.stage(), Stage::from(GradedStage::Seed));
        assert_eq!(
            store.require(ItemKind::Kanji, "k-rest").unwrap().progress.unlocked_at,
            Some(now())
        );
    }

    #[test]
    fn test_unlock_refuses_gated_item() {
        let (store, session) = setup();
        store
            .save(ItemKind::Radical, &[radical_at("r-tree", "木", GradedStage::Seed)])
            .unwrap();
        store
            .save(ItemKind::Kanji, &[LearnableItem::kanji("k", 1, "林", "grove", ["木"])])
            .unwrap();

        let err = session.unlock(ItemKind::Kanji, "k", now()).unwrap_err();
        assert!(err.is_precondition());
        assert!(store.require(ItemKind::Kanji, "k").unwrap().progress.unlocked_at.is_none());
    }

    #[test]
    fn test_answer_refuses_gated_new_word() {
        let (store, session) = setup();
        store
            .save(
                ItemKind::Word,
                &[
                    LearnableItem::word("basic", "hola", "hello"),
                    LearnableItem::word("advanced", "hola amigo", "hello friend")
                        .with_prerequisites(["basic"]),
                ],
            )
            .unwrap();

        let err = session
            .answer(ItemKind::Word, "advanced", Outcome::Correct, now())
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("gated"));
        assert_eq!(store.require(ItemKind::Word, "advanced").unwrap().stage(), Stage(0));
        assert!(session.xp_sink().events().unwrap().is_empty());

        // The ungated word can be answered straight from new
        let report = session
            .answer(ItemKind::Word, "basic", Outcome::Correct, now())
            .unwrap();
        assert_eq!(report.transition.to, Stage(1));
    }

    #[test]
    fn test_answer_opens_new_word_once_prerequisite_mastered() {
        let (store, session) = setup();
        let mut basic = LearnableItem::word("basic", "hola", "hello").with_stage(Stage(5));
        basic.progress.next_review_at = Some(now() + Duration::days(2));
        store
            .save(
                ItemKind::Word,
                &[
                    basic,
                    LearnableItem::word("advanced", "hola amigo", "hello friend")
                        .with_prerequisites(["basic"]),
                ],
            )
            .unwrap();

        let report = session
            .answer(ItemKind::Word, "advanced", Outcome::Correct, now())
            .unwrap();
        assert_eq!(report.transition.to, Stage(1));
        assert_eq!(report.xp, 1);
    }

    struct BrokenXpSink;

    impl XpSink for BrokenXpSink {
        fn record(&self, _event: &XpEvent) -> Result<()> {
            Err(SeedbedError::storage(
                "/tmp/xp.log",
                std::io::Error::other("disk full"),
            ))
        }

        fn events(&self) -> Result<Vec<XpEvent>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_xp_failure_keeps_saved_answer() {
        let store = Arc::new(MemoryItemStore::new());
        store
            .save(ItemKind::Radical, &[radical_at("r-tree", "木", GradedStage::Seed)])
            .unwrap();
        let session =
            ReviewSession::new(Arc::clone(&store), BrokenXpSink, &Config::default()).unwrap();

        let report = session
            .answer(ItemKind::Radical, "r-tree", Outcome::Correct, now())
            .unwrap();
        assert_eq!(report.xp, 2);
        assert!(!report.xp_recorded);

        let saved = store.require(ItemKind::Radical, "r-tree").unwrap();
        assert_eq!(saved.stage(), Stage::from(GradedStage::Sprout));
        assert_eq!(saved.progress.correct_count, 1);
    }

    #[test]
    fn test_unlock_available() {
        let (store, session) = setup();
        store
            .save(
                ItemKind::Radical,
                &[
                    LearnableItem::radical("r-1", 1, "一", "one"),
                    LearnableItem::radical("r-2", 1, "二", "two"),
                    LearnableItem::radical("r-9", 9, "九", "nine"),
                ],
            )
            .unwrap();

        let unlocked = session.unlock_available(ItemKind::Radical, now()).unwrap();
        let ids: Vec<&str> = unlocked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["r-1", "r-2"]);
        assert!(store.require(ItemKind::Radical, "r-9").unwrap().progress.unlocked_at.is_none());
    }

    #[test]
    fn test_item_fatal_errors_can_be_skipped() {
        let (store, session) = setup();
        store
            .save(ItemKind::Radical, &[LearnableItem::radical("r-locked", 1, "一", "one")])
            .unwrap();

        let locked = session.answer(ItemKind::Radical, "r-locked", Outcome::Correct, now());
        let err = locked.as_ref().unwrap_err();
        assert!(err.is_item_fatal());

        let missing = session.answer(ItemKind::Radical, "r-ghost", Outcome::Correct, now());
        assert!(matches!(missing, Err(SeedbedError::NotFound { .. })));

        // A session loop skips both and carries on
        let skipped = missing.map(Some).fail_open_default("answering r-ghost");
        assert!(skipped.is_none());
    }

    #[test]
    fn test_active_level_derived_per_ladder_shape() {
        let (store, session) = setup();
        store
            .save(ItemKind::Radical, &[radical_at("r-1", "一", GradedStage::Tree)])
            .unwrap();
        store
            .save(ItemKind::Word, &[LearnableItem::word("w-1", "uno", "one")])
            .unwrap();

        let snapshot = session.snapshot().unwrap();
        assert_eq!(session.level_for(&snapshot, ItemKind::Kanji), 2);
        assert_eq!(session.level_for(&snapshot, ItemKind::Word), 1);
    }

    #[test]
    fn test_snapshot_replace() {
        let mut snapshot = Snapshot::default();
        snapshot.replace(LearnableItem::word("w", "a", "b"));
        snapshot.replace(LearnableItem::word("w", "a", "b").with_stage(Stage(2)));
        assert_eq!(snapshot.items(ItemKind::Word).len(), 1);
        assert_eq!(snapshot.find(ItemKind::Word, "w").unwrap().stage(), Stage(2));
        assert!(snapshot.find(ItemKind::Kanji, "w").is_err());
    }
}
