pub mod memory;
pub mod rtdb;

use async_trait::async_trait;
use thiserror::Error;

use crate::mastery::types::{Term, TermFields, TermSet, TermSetVersion};

pub use memory::InMemoryTermStore;
pub use rtdb::{RtdbConfig, RtdbTermStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    ReadFailure(String),
    #[error("store write failed: {0}")]
    WriteFailure(String),
    #[error("term not found: {0}")]
    NotFound(String),
    #[error("invalid term key: {0}")]
    InvalidKey(String),
    #[error("write conflict on {key} after {attempts} attempts")]
    Conflict { key: String, attempts: usize },
}

/// Keyed persistence of term records, one namespace per user.
#[async_trait]
pub trait TermStore: Send + Sync {
    /// All terms of a user in store order, tagged with the set's version.
    async fn list_terms(&self, user_id: &str) -> Result<TermSet, StoreError>;

    /// Version tag only, for staleness checks.
    async fn current_version(&self, user_id: &str) -> Result<TermSetVersion, StoreError>;

    /// Creates the term with `initial_score`, or replaces the text fields of
    /// an existing one while keeping its score.
    async fn upsert_term(
        &self,
        user_id: &str,
        key: &str,
        fields: &TermFields,
        initial_score: u32,
    ) -> Result<Term, StoreError>;

    /// Atomically adds one to the stored score and returns the new value.
    async fn increment_score(&self, user_id: &str, key: &str) -> Result<u32, StoreError>;

    /// Removes the term. Deleting a missing key is not an error.
    async fn delete_term(&self, user_id: &str, key: &str) -> Result<(), StoreError>;
}

/// Characters a store path segment cannot carry, plus the escape itself.
const RESERVED: [char; 7] = ['.', '$', '#', '[', ']', '/', '%'];

/// Terms are keyed by their word. Any visible text is a valid key.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidKey("empty key".to_string()));
    }
    if key.chars().any(char::is_control) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Escapes path-reserved characters as `%XX` so words like "etc." can be
/// stored as path segments.
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if RESERVED.contains(&c) {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Inverse of [`escape_key`]. Sequences that do not name a reserved
/// character are kept as written.
pub fn unescape_key(stored: &str) -> String {
    let mut out = String::with_capacity(stored.len());
    let mut rest = stored;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let escaped = rest
            .get(pos + 1..pos + 3)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .map(char::from)
            .filter(|c| RESERVED.contains(c));
        match escaped {
            Some(c) => {
                out.push(c);
                rest = &rest[pos + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}
