//! Realtime-database REST adapter. Terms live at `/{userId}/words/{key}`.
//!
//! Score increments and upserts use the database's ETag compare-and-swap:
//! read with `X-Firebase-ETag: true`, write back with `if-match`, and retry
//! on `412 Precondition Failed`. Concurrent writers from other devices can
//! therefore never swallow an increment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_MATCH};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{escape_key, unescape_key, validate_key, StoreError, TermStore};
use crate::mastery::types::{Term, TermFields, TermSet, TermSetVersion};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CAS_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct RtdbConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
    pub cas_attempts: usize,
}

impl RtdbConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            cas_attempts: DEFAULT_CAS_ATTEMPTS,
        }
    }
}

/// Record shape as stored. A missing score reads as 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTerm {
    #[serde(default)]
    translated_word: String,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    translated_definition: String,
    #[serde(default)]
    score: u32,
}

impl StoredTerm {
    fn into_term(self, key: &str) -> Term {
        Term {
            key: key.to_string(),
            translated_word: self.translated_word,
            definition: self.definition,
            translated_definition: self.translated_definition,
            score: self.score,
        }
    }

    fn from_fields(fields: &TermFields, score: u32) -> Self {
        Self {
            translated_word: fields.translated_word.clone(),
            definition: fields.definition.clone(),
            translated_definition: fields.translated_definition.clone(),
            score,
        }
    }
}

#[derive(Clone)]
pub struct RtdbTermStore {
    config: RtdbConfig,
    client: reqwest::Client,
}

impl RtdbTermStore {
    pub fn new(config: RtdbConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn words_url(&self, user_id: &str) -> String {
        format!(
            "{}/{}/words.json",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(user_id)
        )
    }

    fn term_url(&self, user_id: &str, key: &str) -> String {
        format!(
            "{}/{}/words/{}.json",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(user_id),
            urlencoding::encode(&escape_key(key))
        )
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.auth_token.as_deref() {
            Some(token) if !token.trim().is_empty() => builder.query(&[("auth", token)]),
            _ => builder,
        }
    }

    async fn get_with_etag(&self, url: &str) -> Result<(serde_json::Value, String), StoreError> {
        let resp = self
            .authed(self.client.get(url))
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await
            .map_err(|e| StoreError::ReadFailure(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::ReadFailure(format!("HTTP {status}: {body}")));
        }

        let etag = etag_of(resp.headers()).unwrap_or_default();
        let value = resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| StoreError::ReadFailure(e.to_string()))?;
        Ok((value, etag))
    }

    /// Read-modify-write of one term guarded by its ETag.
    async fn compare_and_swap<F>(&self, user_id: &str, key: &str, update: F) -> Result<Term, StoreError>
    where
        F: Fn(Option<StoredTerm>) -> Result<StoredTerm, StoreError> + Send + Sync,
    {
        validate_key(key)?;
        let url = self.term_url(user_id, key);
        let attempts = self.config.cas_attempts.max(1);

        for attempt in 0..attempts {
            let (value, etag) = self.get_with_etag(&url).await?;
            let current = match value {
                serde_json::Value::Null => None,
                other => Some(serde_json::from_value::<StoredTerm>(other).map_err(|e| {
                    StoreError::ReadFailure(format!("malformed record {key}: {e}"))
                })?),
            };
            let next = update(current)?;

            let mut request = self.authed(self.client.put(&url)).json(&next);
            if let Ok(value) = HeaderValue::from_str(&etag) {
                request = request.header(IF_MATCH, value);
            }
            let resp = request
                .send()
                .await
                .map_err(|e| StoreError::WriteFailure(e.to_string()))?;

            let status = resp.status();
            if status.is_success() {
                return Ok(next.into_term(key));
            }
            if status == StatusCode::PRECONDITION_FAILED {
                debug!(user_id, key, attempt, "etag mismatch, re-reading term");
                continue;
            }
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::WriteFailure(format!("HTTP {status}: {body}")));
        }

        warn!(user_id, key, attempts, "term write kept conflicting");
        Err(StoreError::Conflict {
            key: key.to_string(),
            attempts,
        })
    }
}

#[async_trait]
impl TermStore for RtdbTermStore {
    async fn list_terms(&self, user_id: &str) -> Result<TermSet, StoreError> {
        let (value, etag) = self.get_with_etag(&self.words_url(user_id)).await?;
        Ok(TermSet {
            version: TermSetVersion(etag),
            terms: parse_term_map(user_id, value)?,
        })
    }

    async fn current_version(&self, user_id: &str) -> Result<TermSetVersion, StoreError> {
        let (_, etag) = self.get_with_etag(&self.words_url(user_id)).await?;
        Ok(TermSetVersion(etag))
    }

    async fn upsert_term(
        &self,
        user_id: &str,
        key: &str,
        fields: &TermFields,
        initial_score: u32,
    ) -> Result<Term, StoreError> {
        self.compare_and_swap(user_id, key, |current| {
            let score = current.map(|t| t.score).unwrap_or(initial_score);
            Ok(StoredTerm::from_fields(fields, score))
        })
        .await
    }

    async fn increment_score(&self, user_id: &str, key: &str) -> Result<u32, StoreError> {
        let term = self
            .compare_and_swap(user_id, key, |current| {
                let mut stored = current.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
                stored.score = stored.score.saturating_add(1);
                Ok(stored)
            })
            .await?;
        Ok(term.score)
    }

    async fn delete_term(&self, user_id: &str, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let resp = self
            .authed(self.client.delete(self.term_url(user_id, key)))
            .send()
            .await
            .map_err(|e| StoreError::WriteFailure(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::WriteFailure(format!("HTTP {status}: {body}")))
    }
}

fn etag_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Parses the `/words` object. Records that do not fit the schema are
/// skipped so one bad entry cannot hide the rest of the dictionary.
fn parse_term_map(user_id: &str, value: serde_json::Value) -> Result<Vec<Term>, StoreError> {
    let map = match value {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Object(map) => map,
        other => {
            return Err(StoreError::ReadFailure(format!(
                "expected object of terms, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut terms = Vec::with_capacity(map.len());
    for (key, record) in map {
        match serde_json::from_value::<StoredTerm>(record) {
            Ok(stored) => terms.push(stored.into_term(&unescape_key(&key))),
            Err(err) => warn!(user_id, key = %key, error = %err, "skipping malformed term record"),
        }
    }
    Ok(terms)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_means_no_terms() {
        assert!(parse_term_map("u1", serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn missing_score_defaults_to_zero_and_bad_records_are_skipped() {
        let value = json!({
            "comer": { "translatedWord": "eat", "definition": "to eat", "translatedDefinition": "ingerir" },
            "correr": { "translatedWord": "run", "definition": "to run", "translatedDefinition": "ir rápido", "score": 2 },
            "roto": { "score": "lots" }
        });
        let terms = parse_term_map("u1", value).unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].key, "comer");
        assert_eq!(terms[0].score, 0);
        assert_eq!(terms[1].score, 2);
    }

    #[test]
    fn escaped_keys_read_back_as_words() {
        let value = json!({ "etc%2E": { "translatedWord": "etcétera", "score": 1 } });
        let terms = parse_term_map("u1", value).unwrap();
        assert_eq!(terms[0].key, "etc.");
    }

    #[test]
    fn non_object_root_is_a_read_failure() {
        let err = parse_term_map("u1", json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::ReadFailure(_)));
    }

    #[test]
    fn urls_encode_segments() {
        let store = RtdbTermStore::new(RtdbConfig::new("https://example.test/"));
        assert_eq!(
            store.term_url("user 1", "niño"),
            "https://example.test/user%201/words/ni%C3%B1o.json"
        );
        assert_eq!(store.words_url("u1"), "https://example.test/u1/words.json");
        assert_eq!(
            store.term_url("u1", "etc."),
            "https://example.test/u1/words/etc%252E.json"
        );
    }
}
