use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::phase::SessionPhase;
use super::sequencer::{Advance, Answer, CommitState, ItemStatus, Sequencer, SequencerError, SessionSummary, Submission};
use crate::mastery::types::{Choice, ItemType, Outcome, TermSetVersion};
use crate::mastery::{EngineError, MasteryEngine};
use crate::services::ServiceError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("study session not found: {0}")]
    NotFound(Uuid),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Engine(EngineError::Store(err))
    }
}

/// One practice run for one user. Owns its queue until it ends; calls out
/// to the definition service for grading and to the store for increments.
pub struct StudySession {
    id: Uuid,
    user_id: String,
    started_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    version: TermSetVersion,
    engine: MasteryEngine,
    sequencer: Sequencer,
}

impl StudySession {
    /// Reads the user's terms and builds the queue. Distractors for MCQ items
    /// are fetched before the session becomes ready.
    pub async fn start(engine: &MasteryEngine, user_id: &str) -> Result<Self, SessionError> {
        let snapshot = engine.load_snapshot(user_id).await?;
        let queue = engine.build_practice_queue(&snapshot).await?;
        let sequencer = Sequencer::new(queue);
        let version = snapshot.version;
        let now = Utc::now();
        let session = Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            started_at: now,
            last_activity: now,
            version,
            engine: engine.clone(),
            sequencer,
        };
        info!(
            session_id = %session.id,
            user_id,
            items = session.sequencer.total(),
            phase = session.sequencer.phase().as_str(),
            "study session started"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn phase(&self) -> SessionPhase {
        self.sequencer.phase()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Whether the user's terms changed in the store since the queue was built.
    pub async fn is_stale(&self) -> Result<bool, SessionError> {
        Ok(self.engine.is_stale(&self.user_id, &self.version).await?)
    }

    pub fn flip(&mut self) -> Result<bool, SessionError> {
        self.touch();
        Ok(self.sequencer.flip()?)
    }

    /// Records an answer and settles it as far as possible: grades a free
    /// response, then persists the increment of a correct outcome. When a
    /// call fails the item stays pending and `retry` picks it up.
    pub async fn answer(&mut self, answer: Answer) -> Result<Submission, SessionError> {
        self.touch();
        let submission = self.sequencer.submit(answer)?;
        match &submission {
            Submission::Ignored => {
                debug!(session_id = %self.id, cursor = self.sequencer.cursor(), "duplicate answer ignored");
            }
            Submission::Graded { needs_commit, .. } => {
                if *needs_commit {
                    self.commit().await?;
                }
            }
            Submission::NeedsGrading { .. } => {
                self.settle_pending().await?;
            }
        }
        Ok(submission)
    }

    /// Re-runs whatever the current item is still waiting for.
    pub async fn retry(&mut self) -> Result<(), SessionError> {
        self.touch();
        if self.sequencer.pending_grade().is_none() && self.sequencer.pending_commit().is_none() {
            return Err(SequencerError::NothingPending("retry").into());
        }
        self.settle_pending().await
    }

    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        self.touch();
        let step = self.sequencer.advance()?;
        if step == Advance::Complete {
            let summary = self.sequencer.summary();
            info!(
                session_id = %self.id,
                user_id = %self.user_id,
                answered = summary.answered,
                correct = summary.correct,
                "study session complete"
            );
        }
        Ok(step)
    }

    pub fn abandon(&mut self) -> Result<(), SessionError> {
        self.sequencer.abandon()?;
        info!(
            session_id = %self.id,
            user_id = %self.user_id,
            committed = self.sequencer.summary().committed,
            "study session abandoned"
        );
        Ok(())
    }

    async fn settle_pending(&mut self) -> Result<(), SessionError> {
        if self.sequencer.pending_grade().is_some() {
            self.grade().await?;
        }
        if self.sequencer.pending_commit().is_some() {
            self.commit().await?;
        }
        Ok(())
    }

    async fn grade(&mut self) -> Result<(), SessionError> {
        let Some((word, response)) = self.sequencer.pending_grade() else {
            return Ok(());
        };
        let word = word.to_string();
        let response = response.to_string();

        let definitions = self.engine.definitions();
        let language = self.engine.settings().target_language.as_str();
        let (word_ref, response_ref) = (word.as_str(), response.as_str());
        let result = self
            .engine
            .retry_policy()
            .run("grade_free_response", || {
                definitions.grade_free_response(word_ref, response_ref, language)
            })
            .await;

        let grade = match result {
            Ok(grade) => grade,
            Err(err) => {
                warn!(session_id = %self.id, word = %word, error = %err, "grading failed, item left pending");
                return Err(err.into());
            }
        };
        let outcome = self.sequencer.record_grade(grade)?;
        debug!(session_id = %self.id, word = %word, correct = outcome.is_correct(), "free response graded");
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        let Some(key) = self.sequencer.pending_commit() else {
            return Ok(());
        };
        let key = key.to_string();

        match self.engine.record_outcome(&self.user_id, &key, Outcome::Correct).await {
            Ok(Some(score)) => {
                self.sequencer.mark_committed(score)?;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(EngineError::Store(StoreError::NotFound(_))) => {
                warn!(session_id = %self.id, key = %key, "term deleted mid-session, score dropped");
                self.sequencer.mark_orphaned()?;
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %self.id, key = %key, error = %err, "score increment failed, item left pending");
                Err(err.into())
            }
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn view(&self) -> SessionView {
        let seq = &self.sequencer;
        let current = seq.current().map(|item| {
            let status = seq.status();
            let answered = matches!(status, ItemStatus::Answered | ItemStatus::PendingCommit);
            let supplement = seq.current_supplement();
            let back_visible = match item.item_type {
                ItemType::Flashcard => !item.is_front_facing,
                ItemType::Mcq | ItemType::Frq => answered,
            };

            ItemView {
                front: item.front.clone(),
                back: back_visible.then(|| item.back.clone()),
                item_type: item.item_type,
                score: item.score,
                is_front_facing: item.is_front_facing,
                status,
                choices: supplement.map(|s| ChoicesView {
                    a: s.choice_a.clone(),
                    b: s.choice_b.clone(),
                    c: s.choice_c.clone(),
                }),
                correct_choice: supplement.filter(|_| answered).map(|s| s.correct_choice),
                submitted_choice: seq.submitted_choice(),
                response: seq.submitted_response().map(str::to_string),
                outcome: item.outcome,
                feedback: seq.feedback().map(str::to_string),
                commit: seq.commit_state(),
            }
        });

        SessionView {
            id: self.id,
            phase: seq.phase(),
            position: if current.is_some() { seq.cursor() + 1 } else { 0 },
            total: seq.total(),
            progress: seq.progress(),
            summary: seq.summary().clone(),
            current,
            version: self.version.clone(),
            stale: None,
            started_at: self.started_at,
            last_activity: self.last_activity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub position: usize,
    pub total: usize,
    pub progress: f64,
    pub summary: SessionSummary,
    pub current: Option<ItemView>,
    /// Term-set version the queue was built from.
    pub version: TermSetVersion,
    /// Set by `show` once the store has been checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub front: String,
    /// Hidden until the card is flipped or the item is answered.
    pub back: Option<String>,
    pub item_type: ItemType,
    pub score: u32,
    pub is_front_facing: bool,
    pub status: ItemStatus,
    pub choices: Option<ChoicesView>,
    pub correct_choice: Option<Choice>,
    pub submitted_choice: Option<Choice>,
    pub response: Option<String>,
    pub outcome: Option<Outcome>,
    pub feedback: Option<String>,
    pub commit: Option<CommitState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoicesView {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
}
