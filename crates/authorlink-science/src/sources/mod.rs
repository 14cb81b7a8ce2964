use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};

pub mod orcid;
pub mod osf;

pub use orcid::OrcidRegistry;
pub use osf::OsfDirectory;

/// A person as listed in the hosting platform's contributor directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorProfile {
    pub contributor_id: String,
    pub full_name: String,
    /// Linked registry identifier, if the person published one.
    pub identifier: Option<String>,
}

/// A registry record fetched by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPerson {
    pub identifier: String,
    pub given_name: String,
    pub family_name: String,
    pub email: Option<String>,
}

/// The hosting platform's contributor directory.
#[async_trait]
pub trait ContributorDirectory: Send + Sync {
    fn name(&self) -> &str;

    /// Contributor ids of a preprint, in author order.
    async fn contributors(&self, preprint_id: &str) -> Result<Vec<String>>;

    async fn contributor(&self, contributor_id: &str) -> Result<ContributorProfile>;
}

/// The researcher-identifier registry.
#[async_trait]
pub trait ResearcherRegistry: Send + Sync {
    fn name(&self) -> &str;

    /// `NotFound`/`InvalidOrcid` when the identifier does not resolve.
    async fn person(&self, identifier: &str) -> Result<RegistryPerson>;

    /// Distinct identifier candidates for a surname and given name.
    async fn search_by_name(&self, family_name: &str, given_name: &str) -> Result<Vec<String>>;
}

/// Stand-in used when network enrichment is disabled.
pub struct Offline;

#[async_trait]
impl ContributorDirectory for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    async fn contributors(&self, _preprint_id: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn contributor(&self, contributor_id: &str) -> Result<ContributorProfile> {
        Err(ScienceError::SourceUnavailable(format!(
            "offline: cannot resolve contributor {contributor_id}"
        )))
    }
}

#[async_trait]
impl ResearcherRegistry for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    async fn person(&self, identifier: &str) -> Result<RegistryPerson> {
        Err(ScienceError::SourceUnavailable(format!(
            "offline: cannot look up {identifier}"
        )))
    }

    async fn search_by_name(&self, _family_name: &str, _given_name: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
