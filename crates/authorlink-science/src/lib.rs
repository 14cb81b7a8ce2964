//! Authorlink Science — source normalization, OSF/ORCID lookups, author
//! matching and consolidation.

pub mod enrichment;
pub mod error;
pub mod http;
pub mod identifiers;
pub mod normalize;
pub mod sources;

pub use enrichment::{CancelFlag, EnrichmentPipeline, PreprintResult};
pub use error::{Result, ScienceError};
pub use identifiers::{Orcid, TextScan};
pub use normalize::{NormalizedInput, normalize};
pub use sources::{ContributorDirectory, Offline, OrcidRegistry, OsfDirectory, ResearcherRegistry};
