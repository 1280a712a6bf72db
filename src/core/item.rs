//! Learning item records.
//!
//! A `LearnableItem` is the unit the engine schedules. Every kind shares the
//! same progress block (stage, counters, timestamps); the kind-specific
//! content lives in the tagged `ItemContent` enum.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ladder::{Ladder, LadderShape, Stage};
use crate::error::{Result, SeedbedError};

/// Opaque, stable item identifier.
pub type ItemId = String;

/// The closed set of item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Vocabulary word from a flashcard deck.
    Word,
    /// Fill-in-the-blank sentence.
    ClozeSentence,
    /// Character building block (lowest tier).
    Radical,
    /// Character composed of radicals.
    Kanji,
    /// Written word composed of kanji (highest tier).
    Vocabulary,
}

impl ItemKind {
    /// All kinds, in storage order.
    pub const ALL: [ItemKind; 5] = [
        ItemKind::Word,
        ItemKind::ClozeSentence,
        ItemKind::Radical,
        ItemKind::Kanji,
        ItemKind::Vocabulary,
    ];

    /// Stable snake_case name, used for file names and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::ClozeSentence => "cloze_sentence",
            Self::Radical => "radical",
            Self::Kanji => "kanji",
            Self::Vocabulary => "vocabulary",
        }
    }

    /// Which ladder this kind climbs.
    pub fn shape(&self) -> LadderShape {
        match self {
            Self::Word | Self::ClozeSentence => LadderShape::Numeric,
            Self::Radical | Self::Kanji | Self::Vocabulary => LadderShape::Graded,
        }
    }

    /// The kind whose items satisfy this kind's prerequisites.
    ///
    /// Words and sentences gate on other items of their own kind.
    pub fn prerequisite_kind(&self) -> Option<ItemKind> {
        match self {
            Self::Radical => None,
            Self::Kanji => Some(Self::Radical),
            Self::Vocabulary => Some(Self::Kanji),
            Self::Word => Some(Self::Word),
            Self::ClozeSentence => Some(Self::ClozeSentence),
        }
    }

    /// The kind whose items may unlock when this kind's items progress.
    pub fn dependent_kind(&self) -> Option<ItemKind> {
        match self {
            Self::Radical => Some(Self::Kanji),
            Self::Kanji => Some(Self::Vocabulary),
            Self::Vocabulary => None,
            Self::Word => Some(Self::Word),
            Self::ClozeSentence => Some(Self::ClozeSentence),
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Word => 0,
            Self::ClozeSentence => 1,
            Self::Radical => 2,
            Self::Kanji => 3,
            Self::Vocabulary => 4,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific content of an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemContent {
    Word {
        term: String,
        meaning: String,
        /// Ids of other words that must be mastered first.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        prerequisites: Vec<ItemId>,
    },
    ClozeSentence {
        text: String,
        answer: String,
        /// Ids of other sentences that must be mastered first.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        prerequisites: Vec<ItemId>,
    },
    Radical {
        character: String,
        meaning: String,
    },
    Kanji {
        character: String,
        meaning: String,
        /// Radical ids or characters this kanji is built from.
        #[serde(default)]
        components: Vec<String>,
    },
    Vocabulary {
        characters: String,
        meaning: String,
        /// Kanji ids or characters. Derived from `characters` when empty.
        #[serde(default)]
        components: Vec<String>,
    },
}

impl ItemContent {
    /// The kind tag of this content.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Word { .. } => ItemKind::Word,
            Self::ClozeSentence { .. } => ItemKind::ClozeSentence,
            Self::Radical { .. } => ItemKind::Radical,
            Self::Kanji { .. } => ItemKind::Kanji,
            Self::Vocabulary { .. } => ItemKind::Vocabulary,
        }
    }
}

/// Scheduling state shared by every kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Progress {
    /// Position on the kind's ladder.
    pub stage: Stage,
    /// Promote outcomes ever recorded.
    pub correct_count: u32,
    /// Demote outcomes ever recorded.
    pub wrong_count: u32,
    /// When the item is next due. Unset until the first answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
    /// When the item left the locked stage. Never changes afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    /// When the item was last answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl Progress {
    /// Total answers ever submitted.
    pub fn answers(&self) -> u32 {
        self.correct_count.saturating_add(self.wrong_count)
    }
}

/// A schedulable learning item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearnableItem {
    /// Unique identifier.
    pub id: ItemId,
    /// Tier used for level gating (1-based).
    pub level: u32,
    #[serde(flatten)]
    pub content: ItemContent,
    #[serde(flatten)]
    pub progress: Progress,
}

impl LearnableItem {
    /// Create an item at the initial stage of its ladder with zero counters.
    pub fn new(id: impl Into<ItemId>, level: u32, content: ItemContent) -> Self {
        Self {
            id: id.into(),
            level,
            content,
            progress: Progress::default(),
        }
    }

    /// Create a new flashcard word.
    pub fn word(id: impl Into<ItemId>, term: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self::new(
            id,
            1,
            ItemContent::Word {
                term: term.into(),
                meaning: meaning.into(),
                prerequisites: Vec::new(),
            },
        )
    }

    /// Create a new cloze sentence.
    pub fn cloze(id: impl Into<ItemId>, text: impl Into<String>, answer: impl Into<String>) -> Self {
        Self::new(
            id,
            1,
            ItemContent::ClozeSentence {
                text: text.into(),
                answer: answer.into(),
                prerequisites: Vec::new(),
            },
        )
    }

    /// Create a locked radical.
    pub fn radical(
        id: impl Into<ItemId>,
        level: u32,
        character: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            level,
            ItemContent::Radical {
                character: character.into(),
                meaning: meaning.into(),
            },
        )
    }

    /// Create a locked kanji built from the given radicals.
    pub fn kanji<C: Into<String>>(
        id: impl Into<ItemId>,
        level: u32,
        character: impl Into<String>,
        meaning: impl Into<String>,
        components: impl IntoIterator<Item = C>,
    ) -> Self {
        Self::new(
            id,
            level,
            ItemContent::Kanji {
                character: character.into(),
                meaning: meaning.into(),
                components: components.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Create a locked vocabulary item.
    ///
    /// Its kanji are derived from `characters` unless components are added
    /// with [`LearnableItem::with_components`].
    pub fn vocabulary(
        id: impl Into<ItemId>,
        level: u32,
        characters: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            level,
            ItemContent::Vocabulary {
                characters: characters.into(),
                meaning: meaning.into(),
                components: Vec::new(),
            },
        )
    }

    /// Set the level.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Replace the declared prerequisites (words and sentences).
    pub fn with_prerequisites<I: Into<ItemId>>(mut self, ids: impl IntoIterator<Item = I>) -> Self {
        if let ItemContent::Word { prerequisites, .. }
        | ItemContent::ClozeSentence { prerequisites, .. } = &mut self.content
        {
            *prerequisites = ids.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Replace the declared components (kanji and vocabulary).
    pub fn with_components<C: Into<String>>(mut self, parts: impl IntoIterator<Item = C>) -> Self {
        if let ItemContent::Kanji { components, .. } | ItemContent::Vocabulary { components, .. } =
            &mut self.content
        {
            *components = parts.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Set the stage directly (import and test fixtures).
    pub fn with_stage(mut self, stage: impl Into<Stage>) -> Self {
        self.progress.stage = stage.into();
        self
    }

    /// The item's kind.
    pub fn kind(&self) -> ItemKind {
        self.content.kind()
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.progress.stage
    }

    /// The character or word a learner sees, for kinds that have one.
    pub fn written_form(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Radical { character, .. } | ItemContent::Kanji { character, .. } => {
                Some(character)
            }
            ItemContent::Vocabulary { characters, .. } => Some(characters),
            ItemContent::Word { term, .. } => Some(term),
            ItemContent::ClozeSentence { .. } => None,
        }
    }

    /// Whether `key` names this item, by id or by written form.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.written_form() == Some(key)
    }

    /// Prerequisites as declared on the record (may be empty).
    pub fn declared_prerequisites(&self) -> &[String] {
        match &self.content {
            ItemContent::Word { prerequisites, .. }
            | ItemContent::ClozeSentence { prerequisites, .. } => prerequisites,
            ItemContent::Kanji { components, .. } | ItemContent::Vocabulary { components, .. } => {
                components
            }
            ItemContent::Radical { .. } => &[],
        }
    }

    /// Check the record against its ladder.
    ///
    /// Rejects anything the engine would otherwise have to guess about:
    /// a zero level, a stage outside the ladder, a schedule on an item that
    /// has never been answered, or an unlock time on a still-locked item.
    pub fn validate(&self, ladder: &Ladder) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SeedbedError::corrupt("<empty>", "item id is empty"));
        }
        if self.level == 0 {
            return Err(SeedbedError::corrupt(&self.id, "level must be at least 1"));
        }

        let stage = self.progress.stage;
        if !ladder.contains(stage) {
            return Err(SeedbedError::corrupt(
                &self.id,
                format!(
                    "stage {} outside {} ladder (0..={})",
                    stage,
                    ladder.shape(),
                    ladder.terminal()
                ),
            ));
        }
        if ladder.is_pre_active(stage) && self.progress.next_review_at.is_some() {
            return Err(SeedbedError::corrupt(
                &self.id,
                "next_review_at set before the item entered review",
            ));
        }
        if ladder.is_locked(stage) && self.progress.unlocked_at.is_some() {
            return Err(SeedbedError::corrupt(
                &self.id,
                "item is locked but has an unlock time",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ladder::{GradedStage, Ladders};

    #[test]
    fn test_new_items_start_at_stage_zero() {
        let word = LearnableItem::word("w-1", "gato", "cat");
        assert_eq!(word.stage(), Stage::INITIAL);
        assert_eq!(word.progress.answers(), 0);
        assert!(word.progress.next_review_at.is_none());
        assert!(word.progress.unlocked_at.is_none());

        let radical = LearnableItem::radical("r-1", 1, "一", "ground");
        assert_eq!(radical.stage(), Stage::from(GradedStage::Locked));
    }

    #[test]
    fn test_kind_from_content() {
        assert_eq!(LearnableItem::word("w", "a", "b").kind(), ItemKind::Word);
        assert_eq!(LearnableItem::cloze("c", "a _", "b").kind(), ItemKind::ClozeSentence);
        assert_eq!(LearnableItem::radical("r", 1, "一", "one").kind(), ItemKind::Radical);
        assert_eq!(
            LearnableItem::kanji("k", 1, "大", "big", ["r"]).kind(),
            ItemKind::Kanji
        );
        assert_eq!(
            LearnableItem::vocabulary("v", 1, "大人", "adult").kind(),
            ItemKind::Vocabulary
        );
    }

    #[test]
    fn test_kind_shapes() {
        assert_eq!(ItemKind::Word.shape(), LadderShape::Numeric);
        assert_eq!(ItemKind::ClozeSentence.shape(), LadderShape::Numeric);
        assert_eq!(ItemKind::Radical.shape(), LadderShape::Graded);
        assert_eq!(ItemKind::Kanji.shape(), LadderShape::Graded);
        assert_eq!(ItemKind::Vocabulary.shape(), LadderShape::Graded);
    }

    #[test]
    fn test_tier_links() {
        assert_eq!(ItemKind::Kanji.prerequisite_kind(), Some(ItemKind::Radical));
        assert_eq!(ItemKind::Radical.dependent_kind(), Some(ItemKind::Kanji));
        assert_eq!(ItemKind::Radical.prerequisite_kind(), None);
        assert_eq!(ItemKind::Vocabulary.dependent_kind(), None);
    }

    #[test]
    fn test_matches_by_id_or_character() {
        let radical = LearnableItem::radical("r-ground", 1, "一", "ground");
        assert!(radical.matches("r-ground"));
        assert!(radical.matches("一"));
        assert!(!radical.matches("丨"));
    }

    #[test]
    fn test_with_components_ignored_for_words() {
        let word = LearnableItem::word("w", "a", "b").with_components(["x"]);
        assert!(word.declared_prerequisites().is_empty());

        let word = LearnableItem::word("w", "a", "b").with_prerequisites(["w-0"]);
        assert_eq!(word.declared_prerequisites(), ["w-0".to_string()]);
    }

    #[test]
    fn test_serde_shape() {
        let kanji = LearnableItem::kanji("k-1", 2, "大", "big", ["r-1", "r-2"]);
        let json = serde_json::to_value(&kanji).unwrap();

        assert_eq!(json["kind"], "kanji");
        assert_eq!(json["stage"], 0);
        assert_eq!(json["correct_count"], 0);
        assert_eq!(json["components"][1], "r-2");
        assert!(json.get("next_review_at").is_none());

        let back: LearnableItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, kanji);
    }

    #[test]
    fn test_deserialize_missing_stage_fails() {
        let json = r#"{"id":"w-1","level":1,"kind":"word","term":"a","meaning":"b",
                       "correct_count":0,"wrong_count":0}"#;
        assert!(serde_json::from_str::<LearnableItem>(json).is_err());
    }

    #[test]
    fn test_validate_accepts_fresh_items() {
        let ladders = Ladders::default();
        for item in [
            LearnableItem::word("w", "a", "b"),
            LearnableItem::radical("r", 1, "一", "one"),
            LearnableItem::vocabulary("v", 3, "大人", "adult"),
        ] {
            item.validate(ladders.for_kind(item.kind())).unwrap();
        }
    }

    #[test]
    fn test_validate_rejects_stage_out_of_range() {
        let ladders = Ladders::default();
        let item = LearnableItem::radical("r", 1, "一", "one").with_stage(Stage(9));
        let err = item.validate(ladders.for_kind(ItemKind::Radical)).unwrap_err();
        assert!(matches!(err, SeedbedError::CorruptRecord { .. }));
        assert!(err.to_string().contains("stage 9"));
    }

    #[test]
    fn test_validate_rejects_zero_level() {
        let ladders = Ladders::default();
        let item = LearnableItem::radical("r", 0, "一", "one");
        assert!(item.validate(ladders.for_kind(ItemKind::Radical)).is_err());
    }

    #[test]
    fn test_validate_rejects_schedule_on_new_item() {
        let ladders = Ladders::default();
        let mut item = LearnableItem::word("w", "a", "b");
        item.progress.next_review_at = Some(Utc::now());
        assert!(item.validate(ladders.for_kind(ItemKind::Word)).is_err());
    }

    #[test]
    fn test_validate_rejects_locked_with_unlock_time() {
        let ladders = Ladders::default();
        let mut item = LearnableItem::radical("r", 1, "一", "one");
        item.progress.unlocked_at = Some(Utc::now());
        assert!(item.validate(ladders.for_kind(ItemKind::Radical)).is_err());
    }
}
