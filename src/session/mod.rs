pub mod phase;
pub mod registry;
pub mod sequencer;
pub mod study;

pub use phase::{PhaseMachine, SessionPhase, TransitionError};
pub use registry::{SessionRegistry, SharedSession};
pub use sequencer::{Advance, Answer, CommitState, ItemStatus, Sequencer, SequencerError, SessionSummary, Submission};
pub use study::{ItemView, SessionError, SessionView, StudySession};
