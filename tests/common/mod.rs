#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use lexilens::mastery::{
    Choice, MasteryEngine, MasterySettings, McqSupplement, Term, TermFields, TermSet, TermSetVersion,
};
use lexilens::services::{Definition, DefinitionService, FrqGrade, LookupRequest, RetryPolicy, ServiceError};
use lexilens::session::SessionRegistry;
use lexilens::state::AppState;
use lexilens::store::{InMemoryTermStore, StoreError, TermStore};

pub const USER: &str = "user-1";

pub fn term(key: &str, score: u32) -> Term {
    Term::new(
        key,
        TermFields {
            translated_word: format!("{key}-en"),
            definition: format!("{key} definition"),
            translated_definition: format!("{key} translated definition"),
        },
        score,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistractorMode {
    Full,
    Empty,
    Fail,
}

/// Definition service that answers from a script and counts calls.
pub struct ScriptedDefinitions {
    pub distractor_mode: Mutex<DistractorMode>,
    pub distractor_calls: AtomicUsize,
    pub distractor_words: Mutex<Vec<Vec<String>>>,
    pub grades: Mutex<VecDeque<Result<FrqGrade, ServiceError>>>,
    pub grade_calls: AtomicUsize,
    pub lookups: Mutex<VecDeque<Result<Definition, ServiceError>>>,
    pub lookup_calls: AtomicUsize,
}

impl Default for ScriptedDefinitions {
    fn default() -> Self {
        Self {
            distractor_mode: Mutex::new(DistractorMode::Full),
            distractor_calls: AtomicUsize::new(0),
            distractor_words: Mutex::new(Vec::new()),
            grades: Mutex::new(VecDeque::new()),
            grade_calls: AtomicUsize::new(0),
            lookups: Mutex::new(VecDeque::new()),
            lookup_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedDefinitions {
    pub fn with_distractors(mode: DistractorMode) -> Self {
        let defs = Self::default();
        *defs.distractor_mode.lock() = mode;
        defs
    }

    pub fn push_grade(&self, grade: Result<FrqGrade, ServiceError>) {
        self.grades.lock().push_back(grade);
    }

    pub fn push_lookup(&self, definition: Result<Definition, ServiceError>) {
        self.lookups.lock().push_back(definition);
    }

    pub fn distractor_calls(&self) -> usize {
        self.distractor_calls.load(Ordering::SeqCst)
    }

    pub fn grade_calls(&self) -> usize {
        self.grade_calls.load(Ordering::SeqCst)
    }
}

pub fn definition(word: &str) -> Definition {
    Definition {
        original_word: word.to_string(),
        original_definition: format!("{word} definition"),
        translated_word: format!("{word}-en"),
        translated_definition: format!("{word} translated definition"),
    }
}

#[async_trait]
impl DefinitionService for ScriptedDefinitions {
    async fn lookup(&self, _request: &LookupRequest) -> Result<Definition, ServiceError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.lookups
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(definition("correr")))
    }

    async fn generate_distractors(
        &self,
        words: &[String],
    ) -> Result<HashMap<String, McqSupplement>, ServiceError> {
        self.distractor_calls.fetch_add(1, Ordering::SeqCst);
        self.distractor_words.lock().push(words.to_vec());
        let mode = *self.distractor_mode.lock();
        match mode {
            DistractorMode::Fail => Err(ServiceError::Unavailable("scripted outage".into())),
            DistractorMode::Empty => Ok(HashMap::new()),
            DistractorMode::Full => Ok(words
                .iter()
                .map(|w| {
                    (
                        w.clone(),
                        McqSupplement {
                            choice_a: "wrong one".into(),
                            choice_b: format!("{w} meaning"),
                            choice_c: "wrong two".into(),
                            correct_choice: Choice::B,
                        },
                    )
                })
                .collect()),
        }
    }

    async fn grade_free_response(
        &self,
        _word: &str,
        _sentence: &str,
        _target_language: &str,
    ) -> Result<FrqGrade, ServiceError> {
        self.grade_calls.fetch_add(1, Ordering::SeqCst);
        self.grades.lock().pop_front().unwrap_or(Ok(FrqGrade {
            correct: true,
            feedback: None,
        }))
    }
}

/// In-memory store whose increments can be made to fail.
pub struct FlakyStore {
    pub inner: InMemoryTermStore,
    pub failing_increments: AtomicUsize,
    pub increment_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: InMemoryTermStore) -> Self {
        Self {
            inner,
            failing_increments: AtomicUsize::new(0),
            increment_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_increments(&self, n: usize) {
        self.failing_increments.store(n, Ordering::SeqCst);
    }

    pub fn score_of(&self, key: &str) -> Option<u32> {
        self.inner.score_of(USER, key)
    }
}

#[async_trait]
impl TermStore for FlakyStore {
    async fn list_terms(&self, user_id: &str) -> Result<TermSet, StoreError> {
        self.inner.list_terms(user_id).await
    }

    async fn current_version(&self, user_id: &str) -> Result<TermSetVersion, StoreError> {
        self.inner.current_version(user_id).await
    }

    async fn upsert_term(
        &self,
        user_id: &str,
        key: &str,
        fields: &TermFields,
        initial_score: u32,
    ) -> Result<Term, StoreError> {
        self.inner.upsert_term(user_id, key, fields, initial_score).await
    }

    async fn increment_score(&self, user_id: &str, key: &str) -> Result<u32, StoreError> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_increments.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_increments.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::WriteFailure("scripted outage".into()));
        }
        self.inner.increment_score(user_id, key).await
    }

    async fn delete_term(&self, user_id: &str, key: &str) -> Result<(), StoreError> {
        self.inner.delete_term(user_id, key).await
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        call_timeout: Duration::from_secs(2),
    }
}

pub struct Fixture {
    pub store: Arc<FlakyStore>,
    pub definitions: Arc<ScriptedDefinitions>,
    pub engine: MasteryEngine,
}

pub fn fixture(terms: Vec<Term>, definitions: ScriptedDefinitions) -> Fixture {
    let store = Arc::new(FlakyStore::new(InMemoryTermStore::new().with_terms(USER, terms)));
    let definitions = Arc::new(definitions);
    let engine = MasteryEngine::new(
        MasterySettings::default(),
        store.clone(),
        definitions.clone(),
        fast_retry(),
    );
    Fixture {
        store,
        definitions,
        engine,
    }
}

pub fn create_test_app(fixture: &Fixture) -> Router {
    let state = AppState::new(fixture.engine.clone(), Arc::new(SessionRegistry::default()));
    lexilens::build_app(state)
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
