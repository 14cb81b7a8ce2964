use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::mention::AuthorMention;
use super::source::MentionSource;

/// Raw inputs for one run, in the shapes upstream collaborators hand over.
///
/// Every record carries its own `preprint_id`; records without one are
/// malformed and get dropped during normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceInput {
    /// Preprints to resolve even when no structured-text record names them.
    pub preprints: Vec<String>,
    pub xml_authors: Vec<RawAuthor>,
    pub tei_documents: Vec<TeiDocument>,
    pub platform_contributors: Vec<RawContributor>,
    pub pdf_emails: Vec<RawEmailPool>,
    pub pdf_authors: Vec<RawAuthor>,
    pub pdf_files: Vec<PdfFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAuthor {
    pub preprint_id: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub identifier: Option<String>,
}

/// Structured TEI output of the document-structuring service, inline or on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeiDocument {
    pub preprint_id: Option<String>,
    pub xml: Option<String>,
    pub path: Option<PathBuf>,
}

/// A contributor directory entry. Entries with only a `contributor_id` are
/// resolved through the directory during enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContributor {
    pub preprint_id: Option<String>,
    pub contributor_id: Option<String>,
    pub full_name: Option<String>,
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEmailPool {
    pub preprint_id: Option<String>,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfFile {
    pub preprint_id: Option<String>,
    pub path: PathBuf,
}

/// A contributor id that still needs a directory lookup, with its slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingContributor {
    pub position: usize,
    pub contributor_id: String,
}

/// Everything known about one preprint before enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprintBatch {
    pub preprint_id: String,
    /// Attributed mentions: `xml`, pre-fetched `platform`, attributed `pdf_text`.
    pub mentions: Vec<AuthorMention>,
    pub pending_contributors: Vec<PendingContributor>,
    /// No directory entries were supplied, so the contributor list is fetched.
    pub discover_contributors: bool,
    /// Identifier-like strings scraped from the document, not yet attributed.
    pub candidate_identifiers: BTreeSet<String>,
    /// Unattributed `pdf_text` mention carrying the scraped email pool.
    pub email_pool: Option<AuthorMention>,
}

impl PreprintBatch {
    pub fn new(preprint_id: impl Into<String>) -> Self {
        Self {
            preprint_id: preprint_id.into(),
            mentions: Vec::new(),
            pending_contributors: Vec::new(),
            discover_contributors: true,
            candidate_identifiers: BTreeSet::new(),
            email_pool: None,
        }
    }

    pub fn mentions_from(&self, source: MentionSource) -> impl Iterator<Item = &AuthorMention> {
        self.mentions.iter().filter(move |m| m.source() == source)
    }

    pub fn next_position(&self, source: MentionSource) -> usize {
        self.mentions_from(source)
            .map(|m| m.position + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn candidate_emails(&self) -> Option<&BTreeSet<String>> {
        self.email_pool
            .as_ref()
            .map(|pool| &pool.raw_candidate_emails)
            .filter(|emails| !emails.is_empty())
    }
}
