pub mod definitions;
pub mod llm_provider;
pub mod retry;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::HighlightRegion;
use crate::mastery::types::{McqSupplement, TermFields};

pub use definitions::LlmDefinitionService;
pub use llm_provider::{LLMConfig, LLMError, LLMProvider};
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("definition service not configured: {0}")]
    NotConfigured(&'static str),
    #[error("definition service unavailable: {0}")]
    Unavailable(String),
    #[error("definition service timed out after {0:?}")]
    TimedOut(Duration),
    #[error("malformed service response: {0}")]
    Malformed(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ServiceError::NotConfigured(_))
    }
}

impl From<LLMError> for ServiceError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::NotConfigured(key) => ServiceError::NotConfigured(key),
            LLMError::Json(e) => ServiceError::Malformed(e.to_string()),
            LLMError::EmptyChoices => ServiceError::Malformed("empty completion".to_string()),
            other => ServiceError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedImage {
    /// Base64 without a data-URL prefix.
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub image: CapturedImage,
    pub highlight: HighlightRegion,
    pub target_language: String,
}

/// What the service says about a highlighted word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub original_word: String,
    pub original_definition: String,
    pub translated_word: String,
    pub translated_definition: String,
}

impl Definition {
    pub fn fields(&self) -> TermFields {
        TermFields {
            translated_word: self.translated_word.clone(),
            definition: self.original_definition.clone(),
            translated_definition: self.translated_definition.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrqGrade {
    pub correct: bool,
    pub feedback: Option<String>,
}

/// Generative text/vision backend used for lookups, distractors and grading.
#[async_trait]
pub trait DefinitionService: Send + Sync {
    async fn lookup(&self, request: &LookupRequest) -> Result<Definition, ServiceError>;

    /// One batched call for every MCQ word of a session.
    async fn generate_distractors(
        &self,
        words: &[String],
    ) -> Result<HashMap<String, McqSupplement>, ServiceError>;

    async fn grade_free_response(
        &self,
        word: &str,
        sentence: &str,
        target_language: &str,
    ) -> Result<FrqGrade, ServiceError>;
}
