use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::policy::{plan_items, ItemTypePolicy, QueueOrder};
use super::tiers::{
    bucket_by_familiarity, dictionary_sections, DictionaryQuery, DictionaryView, FamiliarityBuckets,
    DEFAULT_MASTERED_THRESHOLD,
};
use super::types::{ItemType, McqSupplements, Outcome, PracticeQueue, Term, TermSetVersion, TermSnapshot};
use crate::services::{DefinitionService, LookupRequest, RetryPolicy, ServiceError};
use crate::store::{StoreError, TermStore};

pub const DEFAULT_INITIAL_SCORE: u32 = 0;
pub const DEFAULT_TARGET_LANGUAGE: &str = "Spanish";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterySettings {
    pub mastered_threshold: u32,
    pub initial_score: u32,
    pub item_policy: ItemTypePolicy,
    pub queue_order: QueueOrder,
    pub target_language: String,
}

impl Default for MasterySettings {
    fn default() -> Self {
        Self {
            mastered_threshold: DEFAULT_MASTERED_THRESHOLD,
            initial_score: DEFAULT_INITIAL_SCORE,
            item_policy: ItemTypePolicy::default(),
            queue_order: QueueOrder::default(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("nothing was highlighted")]
    EmptyHighlight,
}

/// Term bookkeeping over an injected store and definition service.
#[derive(Clone)]
pub struct MasteryEngine {
    settings: MasterySettings,
    store: Arc<dyn TermStore>,
    definitions: Arc<dyn DefinitionService>,
    retry: RetryPolicy,
}

impl MasteryEngine {
    pub fn new(
        settings: MasterySettings,
        store: Arc<dyn TermStore>,
        definitions: Arc<dyn DefinitionService>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            settings,
            store,
            definitions,
            retry,
        }
    }

    pub fn settings(&self) -> &MasterySettings {
        &self.settings
    }

    pub fn definitions(&self) -> &Arc<dyn DefinitionService> {
        &self.definitions
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn classify(&self, score: u32) -> ItemType {
        self.settings.item_policy.classify(score)
    }

    pub async fn load_snapshot(&self, user_id: &str) -> Result<TermSnapshot, EngineError> {
        let set = self.store.list_terms(user_id).await?;
        debug!(user_id, version = %set.version, terms = set.terms.len(), "term snapshot loaded");
        Ok(TermSnapshot {
            user_id: user_id.to_string(),
            version: set.version,
            terms: set.terms,
            loaded_at: Utc::now(),
        })
    }

    /// Whether the user's terms changed since `version` was read.
    pub async fn is_stale(&self, user_id: &str, version: &TermSetVersion) -> Result<bool, EngineError> {
        let current = self.store.current_version(user_id).await?;
        Ok(current != *version)
    }

    pub fn bucket(&self, terms: &[Term]) -> FamiliarityBuckets {
        bucket_by_familiarity(terms, self.settings.mastered_threshold)
    }

    pub fn dictionary(&self, snapshot: &TermSnapshot, query: &DictionaryQuery) -> DictionaryView {
        DictionaryView {
            version: Some(snapshot.version.clone()),
            ..dictionary_sections(&snapshot.terms, query, self.settings.mastered_threshold)
        }
    }

    /// Orders the snapshot into practice items and fetches distractors for
    /// every MCQ item in one batched request. No MCQ items, no request.
    pub async fn build_practice_queue(&self, snapshot: &TermSnapshot) -> Result<PracticeQueue, EngineError> {
        let items = plan_items(
            &snapshot.terms,
            &self.settings.item_policy,
            self.settings.queue_order,
        );

        let mcq_words: Vec<String> = items
            .iter()
            .filter(|item| item.item_type == ItemType::Mcq)
            .map(|item| item.front.clone())
            .collect();

        if mcq_words.is_empty() {
            debug!(user_id = %snapshot.user_id, items = items.len(), "no mcq items, skipping distractors");
            return Ok(PracticeQueue {
                items,
                supplements: McqSupplements::new(),
                distractor_calls: 0,
            });
        }

        let definitions = &self.definitions;
        let words = &mcq_words;
        let supplements = self
            .retry
            .run("generate_distractors", || definitions.generate_distractors(words))
            .await?;

        let missing = mcq_words
            .iter()
            .filter(|w| !supplements.contains_key(w.as_str()))
            .count();
        if missing > 0 {
            warn!(user_id = %snapshot.user_id, missing, "some mcq items have no choices");
        }

        Ok(PracticeQueue {
            items,
            supplements,
            distractor_calls: 1,
        })
    }

    /// Persists an answer. Only correct answers touch the store, through its
    /// atomic increment; returns the stored score when one was written.
    pub async fn record_outcome(
        &self,
        user_id: &str,
        key: &str,
        outcome: Outcome,
    ) -> Result<Option<u32>, EngineError> {
        if !outcome.is_correct() {
            return Ok(None);
        }
        let score = self.store.increment_score(user_id, key).await?;
        info!(user_id, key, score, "term score incremented");
        Ok(Some(score))
    }

    /// Looks up the highlighted word and saves it. A word seen before keeps
    /// its score; only its text is refreshed.
    pub async fn capture_term(&self, user_id: &str, request: &LookupRequest) -> Result<Term, EngineError> {
        if request.highlight.is_empty() {
            return Err(EngineError::EmptyHighlight);
        }

        let definitions = &self.definitions;
        let definition = self
            .retry
            .run("lookup", || definitions.lookup(request))
            .await?;

        let term = self
            .store
            .upsert_term(
                user_id,
                &definition.original_word,
                &definition.fields(),
                self.settings.initial_score,
            )
            .await?;
        info!(user_id, key = %term.key, score = term.score, "term captured");
        Ok(term)
    }

    /// Deletes a term and returns a fresh snapshot of what is left.
    pub async fn remove_term(&self, user_id: &str, key: &str) -> Result<TermSnapshot, EngineError> {
        self.store.delete_term(user_id, key).await?;
        info!(user_id, key, "term removed");
        self.load_snapshot(user_id).await
    }
}
