//! Score-driven rules: which question type a term gets, how an answer moves
//! its score, and how a session's items are ordered.

use serde::{Deserialize, Serialize};

use super::types::{ItemType, Outcome, PracticeItem, Term};

pub const DEFAULT_MCQ_MIN_SCORE: u32 = 1;
pub const DEFAULT_FRQ_MIN_SCORE: u32 = 2;

/// Score ladder for question types. Scores below `mcq_min_score` get
/// flashcards, scores below `frq_min_score` get MCQs, everything above gets
/// free-response questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTypePolicy {
    pub mcq_min_score: u32,
    pub frq_min_score: u32,
}

impl Default for ItemTypePolicy {
    fn default() -> Self {
        Self {
            mcq_min_score: DEFAULT_MCQ_MIN_SCORE,
            frq_min_score: DEFAULT_FRQ_MIN_SCORE,
        }
    }
}

impl ItemTypePolicy {
    /// Builds a ladder, raising `frq_min_score` to `mcq_min_score` when the
    /// pair is inverted so the ladder stays monotone.
    pub fn new(mcq_min_score: u32, frq_min_score: u32) -> Self {
        Self {
            mcq_min_score,
            frq_min_score: frq_min_score.max(mcq_min_score),
        }
    }

    pub fn classify(&self, score: u32) -> ItemType {
        if score < self.mcq_min_score {
            ItemType::Flashcard
        } else if score < self.frq_min_score {
            ItemType::Mcq
        } else {
            ItemType::Frq
        }
    }
}

/// Classifies with the default ladder.
pub fn classify_item_type(score: u32) -> ItemType {
    ItemTypePolicy::default().classify(score)
}

/// Next score after an answer. Correct answers add one, incorrect ones leave
/// the score alone; mastery only moves upward.
pub fn apply_outcome(score: u32, outcome: Outcome) -> u32 {
    match outcome {
        Outcome::Correct => score.saturating_add(1),
        Outcome::Incorrect => score,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Store order as read.
    Insertion,
    /// Lowest score first; ties keep store order.
    #[default]
    AscendingScore,
}

impl QueueOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "insertion" | "store" => Some(QueueOrder::Insertion),
            "ascending_score" | "ascending" | "score" => Some(QueueOrder::AscendingScore),
            _ => None,
        }
    }
}

/// Turns a term list into ordered practice items.
pub fn plan_items(terms: &[Term], policy: &ItemTypePolicy, order: QueueOrder) -> Vec<PracticeItem> {
    let mut items: Vec<PracticeItem> = terms
        .iter()
        .map(|term| PracticeItem::from_term(term, policy.classify(term.score)))
        .collect();

    if order == QueueOrder::AscendingScore {
        // sort_by_key is stable
        items.sort_by_key(|item| item.score);
    }
    items
}
