use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{validate_key, StoreError, TermStore};
use crate::mastery::types::{Term, TermFields, TermSet, TermSetVersion};

#[derive(Debug, Default)]
struct UserTerms {
    revision: u64,
    terms: Vec<Term>,
}

impl UserTerms {
    fn version(&self) -> TermSetVersion {
        TermSetVersion(self.revision.to_string())
    }

    fn bump(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}

/// Process-local store. Keeps insertion order per user.
#[derive(Debug, Default)]
pub struct InMemoryTermStore {
    users: RwLock<HashMap<String, UserTerms>>,
}

impl InMemoryTermStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user's terms, replacing whatever was there.
    pub fn with_terms(self, user_id: &str, terms: Vec<Term>) -> Self {
        {
            let mut users = self.users.write();
            let entry = users.entry(user_id.to_string()).or_default();
            entry.terms = terms;
            entry.bump();
        }
        self
    }

    pub fn score_of(&self, user_id: &str, key: &str) -> Option<u32> {
        let users = self.users.read();
        users
            .get(user_id)?
            .terms
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.score)
    }
}

#[async_trait]
impl TermStore for InMemoryTermStore {
    async fn list_terms(&self, user_id: &str) -> Result<TermSet, StoreError> {
        let users = self.users.read();
        Ok(match users.get(user_id) {
            Some(entry) => TermSet {
                version: entry.version(),
                terms: entry.terms.clone(),
            },
            None => TermSet {
                version: TermSetVersion("0".to_string()),
                terms: Vec::new(),
            },
        })
    }

    async fn current_version(&self, user_id: &str) -> Result<TermSetVersion, StoreError> {
        let users = self.users.read();
        Ok(users
            .get(user_id)
            .map(UserTerms::version)
            .unwrap_or_else(|| TermSetVersion("0".to_string())))
    }

    async fn upsert_term(
        &self,
        user_id: &str,
        key: &str,
        fields: &TermFields,
        initial_score: u32,
    ) -> Result<Term, StoreError> {
        validate_key(key)?;
        let mut users = self.users.write();
        let entry = users.entry(user_id.to_string()).or_default();

        let term = match entry.terms.iter_mut().find(|t| t.key == key) {
            Some(existing) => {
                let score = existing.score;
                *existing = Term::new(key, fields.clone(), score);
                existing.clone()
            }
            None => {
                let term = Term::new(key, fields.clone(), initial_score);
                entry.terms.push(term.clone());
                term
            }
        };
        entry.bump();
        Ok(term)
    }

    async fn increment_score(&self, user_id: &str, key: &str) -> Result<u32, StoreError> {
        let mut users = self.users.write();
        let entry = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let term = entry
            .terms
            .iter_mut()
            .find(|t| t.key == key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        term.score = term.score.saturating_add(1);
        let score = term.score;
        entry.bump();
        Ok(score)
    }

    async fn delete_term(&self, user_id: &str, key: &str) -> Result<(), StoreError> {
        let mut users = self.users.write();
        if let Some(entry) = users.get_mut(user_id) {
            let before = entry.terms.len();
            entry.terms.retain(|t| t.key != key);
            if entry.terms.len() != before {
                entry.bump();
            }
        }
        Ok(())
    }
}
