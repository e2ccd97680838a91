//! Definition service backed by a chat-completion model.
//!
//! Every call asks for a JSON object and parses it strictly; anything that
//! does not fit the expected shape is reported as a malformed response so
//! callers can retry instead of persisting junk.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::llm_provider::{ChatMessage, ContentPart, LLMProvider};
use super::{DefinitionService, Definition, FrqGrade, LookupRequest, ServiceError};
use crate::mastery::types::{Choice, McqSupplement};

const MAX_DEFINITION_WORDS: usize = 12;

const SYSTEM_PROMPT: &str = "You are a vocabulary assistant for language learners. \
Always reply with a single JSON object and nothing else.";

#[derive(Clone)]
pub struct LlmDefinitionService {
    provider: LLMProvider,
}

impl LlmDefinitionService {
    pub fn new(provider: LLMProvider) -> Self {
        Self { provider }
    }

    async fn ask(&self, user: ChatMessage) -> Result<String, ServiceError> {
        let messages = [ChatMessage::system(SYSTEM_PROMPT), user];
        Ok(self.provider.chat_json(&messages).await?)
    }
}

#[async_trait]
impl DefinitionService for LlmDefinitionService {
    async fn lookup(&self, request: &LookupRequest) -> Result<Definition, ServiceError> {
        let prompt = lookup_prompt(request);
        let message = ChatMessage::user_parts(vec![
            ContentPart::text(prompt),
            ContentPart::inline_image(&request.image.mime_type, &request.image.data),
        ]);
        let raw = self.ask(message).await?;
        parse_definition(&raw)
    }

    async fn generate_distractors(
        &self,
        words: &[String],
    ) -> Result<HashMap<String, McqSupplement>, ServiceError> {
        if words.is_empty() {
            return Ok(HashMap::new());
        }
        let raw = self.ask(ChatMessage::user(distractor_prompt(words))).await?;
        parse_distractors(&raw, words)
    }

    async fn grade_free_response(
        &self,
        word: &str,
        sentence: &str,
        target_language: &str,
    ) -> Result<FrqGrade, ServiceError> {
        let raw = self
            .ask(ChatMessage::user(grading_prompt(word, sentence, target_language)))
            .await?;
        parse_grade(&raw)
    }
}

fn lookup_prompt(request: &LookupRequest) -> String {
    let region = &request.highlight;
    let bbox = region
        .bounding_box()
        .map(|b| {
            format!(
                "The highlight covers x {:.0}..{:.0}, y {:.0}..{:.0}.",
                b.min_x, b.max_x, b.min_y, b.max_y
            )
        })
        .unwrap_or_default();

    format!(
        "Given this image of {w:.0}x{h:.0} pixels.\n\
         Language: \"{lang}\"\n\
         The word to define was highlighted with these pen strokes (SVG paths, pen width {pen:.0}):\n\
         {paths}\n\
         {bbox}\n\
         For the highlighted word and the above language, provide its definition in the word's own language \
         (in {max} words or less), its translation in the provided language, and its definition in the provided \
         language (in {max} words or less). Use this JSON schema:\n\
         {{ \"originalWord\": \"string\", \"originalDefinition\": \"string\", \
         \"translatedWord\": \"string\", \"translatedDefinition\": \"string\" }}",
        w = region.canvas_width,
        h = region.canvas_height,
        lang = request.target_language,
        pen = region.stroke_width,
        paths = region.svg_paths().join("\n"),
        bbox = bbox,
        max = MAX_DEFINITION_WORDS,
    )
}

fn distractor_prompt(words: &[String]) -> String {
    let listed = serde_json::to_string(words).unwrap_or_default();
    format!(
        "Words: {listed}\n\
         Question: \"What does (word) mean?\"\n\
         For each word, write two wrong but misleading answers to the question and the correct answer, \
         shuffled across choices A, B and C. Output one entry per word, keyed by the word exactly as given:\n\
         {{ \"(word)\": {{ \"choices\": {{ \"A\": \"option\", \"B\": \"option\", \"C\": \"option\" }}, \
         \"correctAnswer\": \"A|B|C\" }} }}"
    )
}

fn grading_prompt(word: &str, sentence: &str, target_language: &str) -> String {
    let sentence = serde_json::to_string(sentence).unwrap_or_default();
    format!(
        "A learner was asked to write a sentence that uses the word \"{word}\" correctly.\n\
         Their sentence: {sentence}\n\
         Decide whether the word is used correctly and naturally. If it is not, explain why in \
         {target_language} in one short sentence. Use this JSON schema:\n\
         {{ \"correct\": true, \"feedback\": \"string or null\" }}"
    )
}

/// Models sometimes wrap JSON in a fenced code block.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    original_word: String,
    #[serde(alias = "englishDefinition", alias = "definition")]
    original_definition: String,
    translated_word: String,
    translated_definition: String,
}

fn parse_definition(raw: &str) -> Result<Definition, ServiceError> {
    let parsed: RawDefinition = serde_json::from_str(extract_json(raw))
        .map_err(|e| ServiceError::Malformed(format!("definition: {e}")))?;

    let original_word = parsed.original_word.trim().to_string();
    if original_word.is_empty() {
        return Err(ServiceError::Malformed("definition: empty originalWord".to_string()));
    }

    Ok(Definition {
        original_word,
        original_definition: parsed.original_definition.trim().to_string(),
        translated_word: parsed.translated_word.trim().to_string(),
        translated_definition: parsed.translated_definition.trim().to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMcq {
    choices: RawChoices,
    #[serde(alias = "correctChoice", alias = "answer")]
    correct_answer: String,
}

#[derive(Debug, Deserialize)]
struct RawChoices {
    #[serde(rename = "A")]
    a: String,
    #[serde(rename = "B")]
    b: String,
    #[serde(rename = "C")]
    c: String,
}

/// Entries for words that were not asked about are dropped, and so are
/// entries that do not fit the schema; those items simply have no choices.
fn parse_distractors(
    raw: &str,
    words: &[String],
) -> Result<HashMap<String, McqSupplement>, ServiceError> {
    let root: serde_json::Map<String, serde_json::Value> = serde_json::from_str(extract_json(raw))
        .map_err(|e| ServiceError::Malformed(format!("distractors: {e}")))?;

    let mut out = HashMap::with_capacity(words.len());
    for (word, value) in root {
        if !words.iter().any(|w| *w == word) {
            debug!(word = %word, "ignoring distractors for unrequested word");
            continue;
        }
        let entry = match serde_json::from_value::<RawMcq>(value) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(word = %word, error = %err, "malformed distractor entry");
                continue;
            }
        };
        let Some(correct_choice) = Choice::parse(&entry.correct_answer) else {
            warn!(word = %word, answer = %entry.correct_answer, "distractor entry has no valid answer");
            continue;
        };
        out.insert(
            word,
            McqSupplement {
                choice_a: entry.choices.a,
                choice_b: entry.choices.b,
                choice_c: entry.choices.c,
                correct_choice,
            },
        );
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct RawGrade {
    correct: bool,
    #[serde(default)]
    feedback: Option<String>,
}

fn parse_grade(raw: &str) -> Result<FrqGrade, ServiceError> {
    let parsed: RawGrade = serde_json::from_str(extract_json(raw))
        .map_err(|e| ServiceError::Malformed(format!("grade: {e}")))?;
    Ok(FrqGrade {
        correct: parsed.correct,
        feedback: parsed
            .feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{HighlightCanvas, Point};
    use crate::services::CapturedImage;

    #[test]
    fn fenced_json_is_unwrapped() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn definition_accepts_legacy_field_name() {
        let raw = r#"{"originalWord":" correr ","englishDefinition":"to run","translatedWord":"run","translatedDefinition":"moverse rápido"}"#;
        let def = parse_definition(raw).unwrap();
        assert_eq!(def.original_word, "correr");
        assert_eq!(def.original_definition, "to run");
        assert_eq!(def.fields().definition, "to run");
    }

    #[test]
    fn definition_without_word_is_malformed() {
        let raw = r#"{"originalWord":"","originalDefinition":"x","translatedWord":"y","translatedDefinition":"z"}"#;
        assert!(matches!(parse_definition(raw), Err(ServiceError::Malformed(_))));
        assert!(matches!(parse_definition("not json"), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn distractors_keep_only_valid_requested_entries() {
        let words = vec!["correr".to_string(), "comer".to_string()];
        let raw = r#"{
            "correr": {"question":"What does correr mean?","choices":{"A":"to run","B":"to eat","C":"to sleep"},"correctAnswer":"a"},
            "comer": {"choices":{"A":"x","B":"y"},"correctAnswer":"B"},
            "dormir": {"choices":{"A":"x","B":"y","C":"z"},"correctAnswer":"C"}
        }"#;
        let map = parse_distractors(raw, &words).unwrap();
        assert_eq!(map.len(), 1);
        let mcq = &map["correr"];
        assert_eq!(mcq.correct_choice, Choice::A);
        assert_eq!(mcq.choice_text(Choice::B), "to eat");
    }

    #[test]
    fn distractors_must_be_an_object() {
        let words = vec!["correr".to_string()];
        assert!(matches!(parse_distractors("[]", &words), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn grade_blank_feedback_is_none() {
        let grade = parse_grade(r#"{"correct":true,"feedback":"  "}"#).unwrap();
        assert_eq!(grade, FrqGrade { correct: true, feedback: None });
        let grade = parse_grade(r#"{"correct":false,"feedback":"Falta el sujeto."}"#).unwrap();
        assert_eq!(grade.feedback.as_deref(), Some("Falta el sujeto."));
    }

    #[test]
    fn lookup_prompt_describes_the_highlight() {
        let mut canvas = HighlightCanvas::new(300.0, 600.0);
        canvas.begin(Point::new(10.0, 100.0));
        canvas.extend(Point::new(90.0, 100.0));
        canvas.end();
        let request = LookupRequest {
            image: CapturedImage { data: "AAAA".into(), mime_type: "image/png".into() },
            highlight: canvas.region(),
            target_language: "Spanish".into(),
        };
        let prompt = lookup_prompt(&request);
        assert!(prompt.contains("M 10 100 L 90 100"));
        assert!(prompt.contains("Language: \"Spanish\""));
        assert!(prompt.contains("originalWord"));
    }
}
