//! Cursor over a practice queue. Pure bookkeeping: it decides what the
//! current item needs (grading, a score commit) but never calls out.

use serde::Serialize;
use thiserror::Error;

use super::phase::{PhaseMachine, SessionPhase, TransitionError};
use crate::mastery::types::{Choice, ItemType, McqSupplement, Outcome, PracticeItem, PracticeQueue};
use crate::services::FrqGrade;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Self-assessed recall: flashcards, and MCQs that have no choices.
    Recall { correct: bool },
    Choice(Choice),
    /// Free-response sentence.
    Response(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    NotNeeded,
    Pending,
    Committed { score: u32 },
    /// The term left the store before its increment landed.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemState {
    Presenting,
    PendingGrade { response: String },
    Answered {
        outcome: Outcome,
        response: Option<String>,
        choice: Option<Choice>,
        feedback: Option<String>,
        commit: CommitState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Presenting,
    PendingGrade,
    PendingCommit,
    Answered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Outcome known immediately.
    Graded { outcome: Outcome, needs_commit: bool },
    /// Free response recorded; the grader decides the outcome.
    NeedsGrading { word: String, response: String },
    /// The item was already answered; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next,
    Complete,
}

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("session is over")]
    Finished,
    #[error("turn the card over before answering")]
    NotRevealed,
    #[error("only flashcards can be flipped")]
    NotFlippable,
    #[error("{answer} answers do not fit a {item_type} item")]
    WrongAnswerKind { answer: &'static str, item_type: &'static str },
    #[error("this question has no choices; answer from recall")]
    NoChoices,
    #[error("response is empty")]
    EmptyResponse,
    #[error("current item has not been answered")]
    NotAnswered,
    #[error("current item is waiting for grading")]
    GradePending,
    #[error("current item's score has not been saved")]
    CommitPending,
    #[error("nothing to {0}")]
    NothingPending(&'static str),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub committed: usize,
}

#[derive(Debug)]
pub struct Sequencer {
    queue: PracticeQueue,
    cursor: usize,
    phase: PhaseMachine,
    state: ItemState,
    revealed: bool,
    summary: SessionSummary,
}

impl Sequencer {
    /// Takes a built queue; the session leaves `Loading` right away.
    pub fn new(queue: PracticeQueue) -> Self {
        let total = queue.len();
        let phase = if queue.is_empty() {
            PhaseMachine::loaded_empty()
        } else {
            PhaseMachine::loaded()
        };

        Self {
            queue,
            cursor: 0,
            phase,
            state: ItemState::Presenting,
            revealed: false,
            summary: SessionSummary {
                total,
                ..SessionSummary::default()
            },
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.phase()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.queue.len()
    }

    pub fn items(&self) -> &[PracticeItem] {
        &self.queue.items
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Answered items over total; 1.0 for an empty or finished session.
    pub fn progress(&self) -> f64 {
        if self.queue.is_empty() || self.phase() == SessionPhase::Complete {
            return 1.0;
        }
        self.summary.answered as f64 / self.queue.len() as f64
    }

    pub fn current(&self) -> Option<&PracticeItem> {
        if self.phase().is_terminal() {
            return None;
        }
        self.queue.items.get(self.cursor)
    }

    pub fn current_supplement(&self) -> Option<&McqSupplement> {
        let item = self.current()?;
        if item.item_type != ItemType::Mcq {
            return None;
        }
        self.queue.supplement(&item.front)
    }

    pub fn status(&self) -> ItemStatus {
        match &self.state {
            ItemState::Presenting => ItemStatus::Presenting,
            ItemState::PendingGrade { .. } => ItemStatus::PendingGrade,
            ItemState::Answered { commit: CommitState::Pending, .. } => ItemStatus::PendingCommit,
            ItemState::Answered { .. } => ItemStatus::Answered,
        }
    }

    pub fn feedback(&self) -> Option<&str> {
        match &self.state {
            ItemState::Answered { feedback, .. } => feedback.as_deref(),
            _ => None,
        }
    }

    pub fn submitted_choice(&self) -> Option<Choice> {
        match &self.state {
            ItemState::Answered { choice, .. } => *choice,
            _ => None,
        }
    }

    pub fn submitted_response(&self) -> Option<&str> {
        match &self.state {
            ItemState::PendingGrade { response } => Some(response),
            ItemState::Answered { response, .. } => response.as_deref(),
            ItemState::Presenting => None,
        }
    }

    pub fn commit_state(&self) -> Option<CommitState> {
        match &self.state {
            ItemState::Answered { commit, .. } => Some(*commit),
            _ => None,
        }
    }

    /// Flips a flashcard; returns whether the front now faces up.
    pub fn flip(&mut self) -> Result<bool, SequencerError> {
        if self.phase().is_terminal() {
            return Err(SequencerError::Finished);
        }
        let cursor = self.cursor;
        let item = self
            .queue
            .items
            .get_mut(cursor)
            .ok_or(SequencerError::Finished)?;
        if item.item_type != ItemType::Flashcard {
            return Err(SequencerError::NotFlippable);
        }
        item.is_front_facing = !item.is_front_facing;
        if !item.is_front_facing {
            self.revealed = true;
        }
        Ok(item.is_front_facing)
    }

    /// Accepts exactly one answer per item. Later submissions are ignored.
    pub fn submit(&mut self, answer: Answer) -> Result<Submission, SequencerError> {
        match self.phase() {
            SessionPhase::Complete | SessionPhase::Abandoned => return Err(SequencerError::Finished),
            SessionPhase::Answered | SessionPhase::Advancing => return Ok(Submission::Ignored),
            SessionPhase::Loading | SessionPhase::Presenting => {}
        }
        if self.state != ItemState::Presenting {
            return Ok(Submission::Ignored);
        }

        let item = self.current().ok_or(SequencerError::Finished)?;
        let item_type = item.item_type;
        let front = item.front.clone();
        let supplement = self.current_supplement().cloned();

        let (outcome, choice) = match (item_type, answer) {
            (ItemType::Flashcard, Answer::Recall { correct }) => {
                if !self.revealed {
                    return Err(SequencerError::NotRevealed);
                }
                (Outcome::from_correct(correct), None)
            }
            (ItemType::Mcq, Answer::Choice(choice)) => {
                let supplement = supplement.ok_or(SequencerError::NoChoices)?;
                (Outcome::from_correct(choice == supplement.correct_choice), Some(choice))
            }
            (ItemType::Mcq, Answer::Recall { correct }) if supplement.is_none() => {
                (Outcome::from_correct(correct), None)
            }
            (ItemType::Frq, Answer::Response(response)) => {
                let response = response.trim().to_string();
                if response.is_empty() {
                    return Err(SequencerError::EmptyResponse);
                }
                self.phase.transition_to(SessionPhase::Answered, self.cursor)?;
                self.state = ItemState::PendingGrade { response: response.clone() };
                return Ok(Submission::NeedsGrading { word: front, response });
            }
            (item_type, answer) => {
                return Err(SequencerError::WrongAnswerKind {
                    answer: answer_kind(&answer),
                    item_type: item_type.as_str(),
                })
            }
        };

        self.phase.transition_to(SessionPhase::Answered, self.cursor)?;
        let needs_commit = self.settle(outcome, None, choice, None);
        Ok(Submission::Graded { outcome, needs_commit })
    }

    /// The word and sentence awaiting a grade, if any.
    pub fn pending_grade(&self) -> Option<(&str, &str)> {
        match &self.state {
            ItemState::PendingGrade { response } => {
                let item = self.queue.items.get(self.cursor)?;
                Some((item.front.as_str(), response.as_str()))
            }
            _ => None,
        }
    }

    /// Applies a grade to the pending free response. A grade arriving for an
    /// item that is already graded changes nothing and returns the recorded
    /// outcome.
    pub fn record_grade(&mut self, grade: FrqGrade) -> Result<Outcome, SequencerError> {
        match &self.state {
            ItemState::Answered { outcome, .. } => Ok(*outcome),
            ItemState::Presenting => Err(SequencerError::NotAnswered),
            ItemState::PendingGrade { response } => {
                let response = response.clone();
                let outcome = Outcome::from_correct(grade.correct);
                self.settle(outcome, Some(response), None, grade.feedback);
                Ok(outcome)
            }
        }
    }

    /// Key whose score increment is still outstanding.
    pub fn pending_commit(&self) -> Option<&str> {
        match &self.state {
            ItemState::Answered { commit: CommitState::Pending, .. } => {
                self.queue.items.get(self.cursor).map(|i| i.front.as_str())
            }
            _ => None,
        }
    }

    pub fn mark_committed(&mut self, score: u32) -> Result<(), SequencerError> {
        match &mut self.state {
            ItemState::Answered { commit, .. } if *commit == CommitState::Pending => {
                *commit = CommitState::Committed { score };
                self.summary.committed += 1;
                if let Some(item) = self.queue.items.get_mut(self.cursor) {
                    item.score = score;
                }
                Ok(())
            }
            _ => Err(SequencerError::NothingPending("commit")),
        }
    }

    /// Settles a pending increment whose term no longer exists.
    pub fn mark_orphaned(&mut self) -> Result<(), SequencerError> {
        match &mut self.state {
            ItemState::Answered { commit, .. } if *commit == CommitState::Pending => {
                *commit = CommitState::Dropped;
                Ok(())
            }
            _ => Err(SequencerError::NothingPending("commit")),
        }
    }

    /// Moves past an answered item. Blocked while a grade or a score commit
    /// is outstanding.
    pub fn advance(&mut self) -> Result<Advance, SequencerError> {
        match self.phase() {
            SessionPhase::Complete | SessionPhase::Abandoned => return Err(SequencerError::Finished),
            SessionPhase::Answered => {}
            _ => return Err(SequencerError::NotAnswered),
        }
        match self.status() {
            ItemStatus::Presenting => return Err(SequencerError::NotAnswered),
            ItemStatus::PendingGrade => return Err(SequencerError::GradePending),
            ItemStatus::PendingCommit => return Err(SequencerError::CommitPending),
            ItemStatus::Answered => {}
        }

        self.phase.transition_to(SessionPhase::Advancing, self.cursor)?;
        let next = self.cursor + 1;
        if next >= self.queue.len() {
            self.phase.transition_to(SessionPhase::Complete, self.cursor)?;
            return Ok(Advance::Complete);
        }

        self.cursor = next;
        self.state = ItemState::Presenting;
        self.revealed = false;
        self.phase.transition_to(SessionPhase::Presenting, self.cursor)?;
        Ok(Advance::Next)
    }

    /// Discards the queue. Scores already committed stay committed.
    pub fn abandon(&mut self) -> Result<(), SequencerError> {
        if self.phase().is_terminal() {
            return Err(SequencerError::Finished);
        }
        self.phase.transition_to(SessionPhase::Abandoned, self.cursor)?;
        self.queue = PracticeQueue::default();
        self.state = ItemState::Presenting;
        Ok(())
    }

    fn settle(
        &mut self,
        outcome: Outcome,
        response: Option<String>,
        choice: Option<Choice>,
        feedback: Option<String>,
    ) -> bool {
        let needs_commit = outcome.is_correct();
        self.state = ItemState::Answered {
            outcome,
            response,
            choice,
            feedback,
            commit: if needs_commit {
                CommitState::Pending
            } else {
                CommitState::NotNeeded
            },
        };
        if let Some(item) = self.queue.items.get_mut(self.cursor) {
            item.outcome = Some(outcome);
        }
        self.summary.answered += 1;
        match outcome {
            Outcome::Correct => self.summary.correct += 1,
            Outcome::Incorrect => self.summary.incorrect += 1,
        }
        needs_commit
    }
}

fn answer_kind(answer: &Answer) -> &'static str {
    match answer {
        Answer::Recall { .. } => "recall",
        Answer::Choice(_) => "choice",
        Answer::Response(_) => "response",
    }
}
