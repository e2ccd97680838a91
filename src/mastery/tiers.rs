//! Familiarity tiers for the dictionary view.

use serde::Serialize;

use super::types::{FamiliarityTier, Term, TermSetVersion};

pub const DEFAULT_MASTERED_THRESHOLD: u32 = 3;

pub fn tier_for(score: u32, mastered_threshold: u32) -> FamiliarityTier {
    if score == 0 {
        FamiliarityTier::Unfamiliar
    } else if score < mastered_threshold {
        FamiliarityTier::Familiar
    } else {
        FamiliarityTier::Mastered
    }
}

/// Stable partition of a term list into the three tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamiliarityBuckets {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unfamiliar: Vec<Term>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub familiar: Vec<Term>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mastered: Vec<Term>,
}

impl FamiliarityBuckets {
    pub fn get(&self, tier: FamiliarityTier) -> &[Term] {
        match tier {
            FamiliarityTier::Unfamiliar => &self.unfamiliar,
            FamiliarityTier::Familiar => &self.familiar,
            FamiliarityTier::Mastered => &self.mastered,
        }
    }

    fn get_mut(&mut self, tier: FamiliarityTier) -> &mut Vec<Term> {
        match tier {
            FamiliarityTier::Unfamiliar => &mut self.unfamiliar,
            FamiliarityTier::Familiar => &mut self.familiar,
            FamiliarityTier::Mastered => &mut self.mastered,
        }
    }

    /// Tiers in display order, skipping empty ones.
    pub fn non_empty(&self) -> impl Iterator<Item = (FamiliarityTier, &[Term])> + '_ {
        FamiliarityTier::ALL
            .into_iter()
            .map(|tier| (tier, self.get(tier)))
            .filter(|(_, terms)| !terms.is_empty())
    }

    pub fn len(&self) -> usize {
        self.unfamiliar.len() + self.familiar.len() + self.mastered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> TierCounts {
        TierCounts {
            unfamiliar: self.unfamiliar.len(),
            familiar: self.familiar.len(),
            mastered: self.mastered.len(),
        }
    }
}

pub fn bucket_by_familiarity(terms: &[Term], mastered_threshold: u32) -> FamiliarityBuckets {
    let mut buckets = FamiliarityBuckets::default();
    for term in terms {
        buckets
            .get_mut(tier_for(term.score, mastered_threshold))
            .push(term.clone());
    }
    buckets
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub unfamiliar: usize,
    pub familiar: usize,
    pub mastered: usize,
}

impl TierCounts {
    pub fn get(&self, tier: FamiliarityTier) -> usize {
        match tier {
            FamiliarityTier::Unfamiliar => self.unfamiliar,
            FamiliarityTier::Familiar => self.familiar,
            FamiliarityTier::Mastered => self.mastered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierHeader {
    pub tier: FamiliarityTier,
    pub title: &'static str,
    /// Lowest score that lands in this tier.
    pub score: u32,
}

impl TierHeader {
    pub fn new(tier: FamiliarityTier, mastered_threshold: u32) -> Self {
        let (title, score) = match tier {
            FamiliarityTier::Unfamiliar => ("Unfamiliar", 0),
            FamiliarityTier::Familiar => ("Familiar", 1),
            FamiliarityTier::Mastered => ("Mastered", mastered_threshold),
        };
        Self { tier, title, score }
    }
}

/// A header and its entries. `count` is always `terms.len()`; sections are
/// only built for non-empty tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionarySection {
    pub header: TierHeader,
    pub count: usize,
    pub terms: Vec<Term>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryQuery {
    /// Case-insensitive prefix match on the term key.
    pub search: Option<String>,
    /// Show only this tier.
    pub tier: Option<FamiliarityTier>,
}

impl DictionaryQuery {
    fn matches(&self, term: &Term) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(prefix) => term.key.to_lowercase().starts_with(&prefix.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryView {
    pub sections: Vec<DictionarySection>,
    pub counts: TierCounts,
    pub total: usize,
    /// Term-set version the view was built from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<TermSetVersion>,
}

pub fn dictionary_sections(
    terms: &[Term],
    query: &DictionaryQuery,
    mastered_threshold: u32,
) -> DictionaryView {
    let matching: Vec<Term> = terms.iter().filter(|t| query.matches(t)).cloned().collect();
    let buckets = bucket_by_familiarity(&matching, mastered_threshold);
    let counts = buckets.counts();

    let sections: Vec<DictionarySection> = buckets
        .non_empty()
        .filter(|(tier, _)| query.tier.map_or(true, |only| only == *tier))
        .map(|(tier, terms)| DictionarySection {
            header: TierHeader::new(tier, mastered_threshold),
            count: terms.len(),
            terms: terms.to_vec(),
        })
        .collect();

    DictionaryView {
        sections,
        counts,
        total: buckets.len(),
        version: None,
    }
}
