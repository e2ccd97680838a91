use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Loading,
    Presenting,
    Answered,
    Advancing,
    Complete,
    Abandoned,
}

impl SessionPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Loading => "LOADING",
            SessionPhase::Presenting => "PRESENTING",
            SessionPhase::Answered => "ANSWERED",
            SessionPhase::Advancing => "ADVANCING",
            SessionPhase::Complete => "COMPLETE",
            SessionPhase::Abandoned => "ABANDONED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Complete | SessionPhase::Abandoned)
    }
}

#[derive(Debug, Clone)]
pub struct PhaseTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub cursor: usize,
    pub at: DateTime<Utc>,
}

const HISTORY_LIMIT: usize = 100;

#[derive(Debug)]
pub struct PhaseMachine {
    current: SessionPhase,
    history: Vec<PhaseTransition>,
    change_count: u64,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            current: SessionPhase::Loading,
            history: Vec::new(),
            change_count: 0,
        }
    }

    /// Machine for a queue that finished loading with items to present.
    pub fn loaded() -> Self {
        Self::after_load(SessionPhase::Presenting)
    }

    /// Machine for a queue that finished loading with nothing in it.
    pub fn loaded_empty() -> Self {
        Self::after_load(SessionPhase::Complete)
    }

    fn after_load(target: SessionPhase) -> Self {
        Self {
            current: target,
            history: vec![PhaseTransition {
                from: SessionPhase::Loading,
                to: target,
                cursor: 0,
                at: Utc::now(),
            }],
            change_count: 1,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.current
    }

    pub fn change_count(&self) -> u64 {
        self.change_count
    }

    pub fn history(&self) -> &[PhaseTransition] {
        &self.history
    }

    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        if target == SessionPhase::Abandoned {
            return !self.current.is_terminal();
        }
        matches!(
            (self.current, target),
            (SessionPhase::Loading, SessionPhase::Presenting)
                | (SessionPhase::Loading, SessionPhase::Complete)
                | (SessionPhase::Presenting, SessionPhase::Answered)
                | (SessionPhase::Answered, SessionPhase::Advancing)
                | (SessionPhase::Advancing, SessionPhase::Presenting)
                | (SessionPhase::Advancing, SessionPhase::Complete)
        )
    }

    pub fn transition_to(&mut self, target: SessionPhase, cursor: usize) -> Result<(), TransitionError> {
        if !self.can_transition_to(target) {
            return Err(TransitionError::InvalidTransition {
                from: self.current,
                to: target,
            });
        }

        self.history.push(PhaseTransition {
            from: self.current,
            to: target,
            cursor,
            at: Utc::now(),
        });
        self.current = target;
        self.change_count = self.change_count.saturating_add(1);

        if self.history.len() > HISTORY_LIMIT {
            let extra = self.history.len() - HISTORY_LIMIT;
            self.history.drain(0..extra);
        }

        Ok(())
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
}
