use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved vocabulary entry. `key` is the original-language word and is
/// unique per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub key: String,
    pub translated_word: String,
    pub definition: String,
    pub translated_definition: String,
    pub score: u32,
}

impl Term {
    pub fn new(key: impl Into<String>, fields: TermFields, score: u32) -> Self {
        Self {
            key: key.into(),
            translated_word: fields.translated_word,
            definition: fields.definition,
            translated_definition: fields.translated_definition,
            score,
        }
    }

    pub fn fields(&self) -> TermFields {
        TermFields {
            translated_word: self.translated_word.clone(),
            definition: self.definition.clone(),
            translated_definition: self.translated_definition.clone(),
        }
    }
}

/// The text columns of a term. Upserts never carry a score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermFields {
    pub translated_word: String,
    pub definition: String,
    pub translated_definition: String,
}

/// Opaque version tag of a user's term set. Changes whenever any term of
/// that user is written or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermSetVersion(pub String);

impl fmt::Display for TermSetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A version-tagged read of all terms for one user, in store order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSet {
    pub version: TermSetVersion,
    pub terms: Vec<Term>,
}

/// An in-memory snapshot the engine works against.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSnapshot {
    pub user_id: String,
    pub version: TermSetVersion,
    pub terms: Vec<Term>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Flashcard,
    Mcq,
    Frq,
}

impl ItemType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ItemType::Flashcard => "flashcard",
            ItemType::Mcq => "mcq",
            ItemType::Frq => "frq",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
}

impl Outcome {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        }
    }

    pub fn is_correct(self) -> bool {
        matches!(self, Outcome::Correct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamiliarityTier {
    Unfamiliar,
    Familiar,
    Mastered,
}

impl FamiliarityTier {
    /// Fixed evaluation and display order.
    pub const ALL: [FamiliarityTier; 3] = [
        FamiliarityTier::Unfamiliar,
        FamiliarityTier::Familiar,
        FamiliarityTier::Mastered,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FamiliarityTier::Unfamiliar => "unfamiliar",
            FamiliarityTier::Familiar => "familiar",
            FamiliarityTier::Mastered => "mastered",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unfamiliar" => Some(FamiliarityTier::Unfamiliar),
            "familiar" => Some(FamiliarityTier::Familiar),
            "mastered" => Some(FamiliarityTier::Mastered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
}

impl Choice {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Choice::A),
            "B" => Some(Choice::B),
            "C" => Some(Choice::C),
            _ => None,
        }
    }
}

/// Distractor set for one MCQ item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqSupplement {
    pub choice_a: String,
    pub choice_b: String,
    pub choice_c: String,
    pub correct_choice: Choice,
}

impl McqSupplement {
    pub fn choice_text(&self, choice: Choice) -> &str {
        match choice {
            Choice::A => &self.choice_a,
            Choice::B => &self.choice_b,
            Choice::C => &self.choice_c,
        }
    }
}

/// Supplements keyed by the item's `front`.
pub type McqSupplements = HashMap<String, McqSupplement>;

/// A session-scoped question derived from a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeItem {
    pub front: String,
    pub back: String,
    pub item_type: ItemType,
    pub score: u32,
    pub is_front_facing: bool,
    pub outcome: Option<Outcome>,
}

impl PracticeItem {
    pub fn from_term(term: &Term, item_type: ItemType) -> Self {
        Self {
            front: term.key.clone(),
            back: term.translated_definition.clone(),
            item_type,
            score: term.score,
            is_front_facing: true,
            outcome: None,
        }
    }
}

/// The ordered items of one session plus the MCQ supplements fetched for them.
#[derive(Debug, Clone, Default)]
pub struct PracticeQueue {
    pub items: Vec<PracticeItem>,
    pub supplements: McqSupplements,
    /// Number of distractor-generation calls issued while building (0 or 1).
    pub distractor_calls: usize,
}

impl PracticeQueue {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn supplement(&self, front: &str) -> Option<&McqSupplement> {
        self.supplements.get(front)
    }
}
