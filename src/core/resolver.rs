//! Dependency resolution and unlocking.
//!
//! Higher tiers open only when the lower-tier items they are built from are
//! mastered: radicals gate kanji, kanji gate vocabulary. Words and cloze
//! sentences gate on declared prerequisites of their own kind. On top of
//! that, an item never opens before the learner's active level reaches it.
//! Both conditions must hold.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::core::item::{ItemKind, LearnableItem};
use crate::core::ladder::Ladders;
use crate::error::{Result, SeedbedError};

/// The collections prerequisites are resolved against, plus the learner's
/// current level.
#[derive(Debug, Clone, Copy)]
pub struct ItemGraph<'a> {
    active_level: u32,
    radicals: &'a [LearnableItem],
    kanji: &'a [LearnableItem],
    vocabulary: &'a [LearnableItem],
    words: &'a [LearnableItem],
    sentences: &'a [LearnableItem],
}

impl<'a> ItemGraph<'a> {
    /// An empty graph at `active_level`.
    pub fn new(active_level: u32) -> Self {
        Self {
            active_level,
            radicals: &[],
            kanji: &[],
            vocabulary: &[],
            words: &[],
            sentences: &[],
        }
    }

    pub fn with_radicals(mut self, items: &'a [LearnableItem]) -> Self {
        self.radicals = items;
        self
    }

    pub fn with_kanji(mut self, items: &'a [LearnableItem]) -> Self {
        self.kanji = items;
        self
    }

    pub fn with_vocabulary(mut self, items: &'a [LearnableItem]) -> Self {
        self.vocabulary = items;
        self
    }

    pub fn with_words(mut self, items: &'a [LearnableItem]) -> Self {
        self.words = items;
        self
    }

    pub fn with_sentences(mut self, items: &'a [LearnableItem]) -> Self {
        self.sentences = items;
        self
    }

    /// Attach `items` as the collection for `kind`.
    pub fn with_collection(self, kind: ItemKind, items: &'a [LearnableItem]) -> Self {
        match kind {
            ItemKind::Radical => self.with_radicals(items),
            ItemKind::Kanji => self.with_kanji(items),
            ItemKind::Vocabulary => self.with_vocabulary(items),
            ItemKind::Word => self.with_words(items),
            ItemKind::ClozeSentence => self.with_sentences(items),
        }
    }

    pub fn active_level(&self) -> u32 {
        self.active_level
    }

    /// The supplied collection for `kind`.
    pub fn collection(&self, kind: ItemKind) -> &'a [LearnableItem] {
        match kind {
            ItemKind::Radical => self.radicals,
            ItemKind::Kanji => self.kanji,
            ItemKind::Vocabulary => self.vocabulary,
            ItemKind::Word => self.words,
            ItemKind::ClozeSentence => self.sentences,
        }
    }
}

/// Resolve an item's prerequisites against the graph.
///
/// Returns `None` when a declared prerequisite is missing from the supplied
/// collection. Vocabulary without declared components depends on every
/// kanji whose character appears in its written form; other characters
/// (kana, punctuation) carry no prerequisite.
pub fn resolve_prerequisites<'a>(
    item: &LearnableItem,
    graph: &ItemGraph<'a>,
) -> Option<Vec<&'a LearnableItem>> {
    let Some(kind) = item.kind().prerequisite_kind() else {
        return Some(Vec::new());
    };
    let pool = graph.collection(kind);
    let declared = item.declared_prerequisites();

    if declared.is_empty() && item.kind() == ItemKind::Vocabulary {
        let derived: Vec<&'a LearnableItem> = item
            .written_form()
            .unwrap_or_default()
            .chars()
            .filter_map(|c| {
                let mut buf = [0u8; 4];
                let key: &str = c.encode_utf8(&mut buf);
                pool.iter().find(|k| k.written_form() == Some(key))
            })
            .collect();
        return Some(derived);
    }

    declared
        .iter()
        .map(|key| pool.iter().find(|candidate| candidate.matches(key)))
        .collect()
}

/// Whether every prerequisite of `item` has reached the mastery threshold.
pub fn prerequisites_met(item: &LearnableItem, graph: &ItemGraph<'_>, ladders: &Ladders) -> bool {
    match resolve_prerequisites(item, graph) {
        Some(prereqs) => prereqs
            .iter()
            .all(|p| ladders.is_mastered(p.kind(), p.stage())),
        None => {
            tracing::debug!(id = %item.id, "declared prerequisite not in collection");
            false
        }
    }
}

/// Level gate AND prerequisite gate.
pub fn is_gate_open(item: &LearnableItem, graph: &ItemGraph<'_>, ladders: &Ladders) -> bool {
    if item.level > graph.active_level() {
        return false;
    }
    prerequisites_met(item, graph, ladders)
}

/// The locked candidates whose gates are open, in input order.
pub fn unlockable<'c>(
    candidates: &'c [LearnableItem],
    graph: &ItemGraph<'_>,
    ladders: &Ladders,
) -> Vec<&'c LearnableItem> {
    candidates
        .iter()
        .filter(|item| {
            let ladder = ladders.for_kind(item.kind());
            if let Err(e) = item.validate(ladder) {
                tracing::warn!(id = %item.id, error = %e, "skipping corrupt record");
                return false;
            }
            ladder.is_locked(item.stage()) && is_gate_open(item, graph, ladders)
        })
        .collect()
}

/// Move a locked item onto the first active stage.
///
/// The unlocked item has no schedule yet: it is presented once as a lesson
/// and enters the review cycle on its first answer. Gating is the caller's
/// concern; see [`unlockable`].
pub fn unlock(item: &LearnableItem, now: DateTime<Utc>, ladders: &Ladders) -> Result<LearnableItem> {
    let ladder = ladders.for_kind(item.kind());
    item.validate(ladder)?;

    if !ladder.is_locked(item.stage()) {
        return Err(SeedbedError::precondition(format!(
            "{} {} is not locked (stage {})",
            item.kind(),
            item.id,
            ladder.stage_name(item.stage())
        )));
    }

    let mut unlocked = item.clone();
    unlocked.progress.stage = ladder.first_active();
    unlocked.progress.unlocked_at = Some(now);
    unlocked.progress.next_review_at = None;

    tracing::debug!(kind = %item.kind(), id = %item.id, "unlocked");
    Ok(unlocked)
}

/// Unlock every unlockable candidate in one pass.
pub fn unlock_all(
    candidates: &[LearnableItem],
    graph: &ItemGraph<'_>,
    now: DateTime<Utc>,
    ladders: &Ladders,
) -> Result<Vec<LearnableItem>> {
    unlockable(candidates, graph, ladders)
        .into_iter()
        .map(|item| unlock(item, now, ladders))
        .collect()
}

/// The learner's current level.
///
/// Starts at 1 and moves up while at least `threshold` of the items at the
/// current level are mastered. A level with no items stops the climb.
pub fn active_level<'a>(
    items: impl IntoIterator<Item = &'a LearnableItem>,
    ladders: &Ladders,
    threshold: f64,
) -> u32 {
    // (total, mastered) per level
    let mut per_level: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    for item in items {
        let counts = per_level.entry(item.level).or_default();
        counts.0 += 1;
        counts.1 += usize::from(ladders.is_mastered(item.kind(), item.stage()));
    }

    let mut level = 1u32;
    while let Some(&(total, mastered)) = per_level.get(&level) {
        if (mastered as f64) < threshold * total as f64 || level == u32::MAX {
            break;
        }
        level += 1;
    }
    level
}
