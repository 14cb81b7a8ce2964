//! Enrichment: external lookups, fuzzy join, priority merge and pool email
//! assignment, driven per preprint by [`EnrichmentPipeline`].

pub mod email;
pub mod join;
pub mod matching;
pub mod merge;
pub mod pipeline;

pub use email::{EmailAssigner, EmailAssignment};
pub use join::{FuzzyJoiner, MatchCandidate, Slot, build_slots};
pub use matching::{SimilarityMatrix, name_similarity, normalized_distance};
pub use merge::{NAME_PRECEDENCE, PriorityMerger};
pub use pipeline::{CancelFlag, EnrichmentPipeline, PreprintResult};
