pub mod engine;
pub mod policy;
pub mod tiers;
pub mod types;

pub use engine::{EngineError, MasteryEngine, MasterySettings};
pub use policy::{apply_outcome, classify_item_type, ItemTypePolicy, QueueOrder};
pub use tiers::{bucket_by_familiarity, DictionaryQuery, DictionaryView, FamiliarityBuckets};
pub use types::{
    Choice, FamiliarityTier, ItemType, McqSupplement, Outcome, PracticeItem, PracticeQueue, Term,
    TermFields, TermSet, TermSetVersion, TermSnapshot,
};
