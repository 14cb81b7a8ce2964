//! Source normalizer: turns raw per-source payloads into per-preprint
//! batches of [`AuthorMention`]s.

pub mod tei;

use std::collections::BTreeMap;

use authorlink_core::{
    AuthorMention, MentionSource, PendingContributor, PreprintBatch, RawAuthor, SourceInput,
    TeiDocument, collapse_whitespace, non_blank,
};
use tracing::{debug, warn};

use crate::error::{Result, ScienceError};
use crate::identifiers::{normalize_email, normalize_identifier, scan_pdf};

pub use tei::{TeiAuthor, parse_tei_authors};

/// Normalizer output: batches in `preprint_id` order plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    pub batches: Vec<PreprintBatch>,
    pub malformed_dropped: usize,
    /// `(preprint_id, message)` for inputs that could not be read.
    pub notes: Vec<(String, String)>,
}

struct Normalizer {
    batches: BTreeMap<String, PreprintBatch>,
    malformed_dropped: usize,
    notes: Vec<(String, String)>,
}

pub fn normalize(input: &SourceInput) -> NormalizedInput {
    let mut n = Normalizer {
        batches: BTreeMap::new(),
        malformed_dropped: 0,
        notes: Vec::new(),
    };

    for id in &input.preprints {
        match require_preprint_id(Some(id.as_str()), "preprint") {
            Ok(id) => {
                n.batch(&id);
            }
            Err(err) => n.drop_malformed(err),
        }
    }

    for raw in &input.xml_authors {
        n.push_author(raw, MentionSource::Xml);
    }
    for doc in &input.tei_documents {
        n.push_tei(doc);
    }
    for raw in &input.platform_contributors {
        let preprint_id = match require_preprint_id(raw.preprint_id.as_deref(), "platform") {
            Ok(id) => id,
            Err(err) => {
                n.drop_malformed(err);
                continue;
            }
        };
        let full_name = non_blank(raw.full_name.as_deref());
        let contributor_id = non_blank(raw.contributor_id.as_deref());
        let batch = n.batch(&preprint_id);
        batch.discover_contributors = false;
        let position = batch.next_position(MentionSource::Platform).max(
            batch
                .pending_contributors
                .iter()
                .map(|p| p.position + 1)
                .max()
                .unwrap_or(0),
        );
        match (full_name, contributor_id) {
            (Some(full_name), _) => {
                let mention = platform_mention(
                    &preprint_id,
                    position,
                    &full_name,
                    raw.identifier.as_deref(),
                );
                batch.mentions.push(mention);
            }
            (None, Some(contributor_id)) => {
                batch.pending_contributors.push(PendingContributor {
                    position,
                    contributor_id,
                });
            }
            (None, None) => n.drop_malformed(ScienceError::MalformedSourceRecord {
                origin: "platform".to_string(),
                reason: format!("contributor on {preprint_id} has neither name nor id"),
            }),
        }
    }
    for raw in &input.pdf_authors {
        n.push_author(raw, MentionSource::PdfText);
    }
    for pool in &input.pdf_emails {
        match require_preprint_id(pool.preprint_id.as_deref(), "pdf_text") {
            Ok(id) => n.add_pool_emails(&id, pool.emails.iter().map(String::as_str)),
            Err(err) => n.drop_malformed(err),
        }
    }
    for file in &input.pdf_files {
        let preprint_id = match require_preprint_id(file.preprint_id.as_deref(), "pdf_text") {
            Ok(id) => id,
            Err(err) => {
                n.drop_malformed(err);
                continue;
            }
        };
        match scan_pdf(&file.path) {
            Ok(scan) => {
                n.add_pool_emails(&preprint_id, scan.emails.iter().map(String::as_str));
                n.batch(&preprint_id).candidate_identifiers.extend(scan.orcids);
            }
            Err(err) => {
                warn!(preprint_id = %preprint_id, error = %err, "PDF scan failed");
                n.notes.push((preprint_id, err.to_string()));
            }
        }
    }

    n.finish()
}

/// [`normalize`] for async callers. PDF parsing is CPU bound, so inputs
/// naming PDF files are normalized on the blocking pool.
pub async fn normalize_off_thread(input: &SourceInput) -> Result<NormalizedInput> {
    if input.pdf_files.is_empty() {
        return Ok(normalize(input));
    }
    let owned = input.clone();
    tokio::task::spawn_blocking(move || normalize(&owned))
        .await
        .map_err(|e| ScienceError::PdfExtraction(format!("PDF scan task failed: {e}")))
}

impl Normalizer {
    fn batch(&mut self, preprint_id: &str) -> &mut PreprintBatch {
        self.batches
            .entry(preprint_id.to_string())
            .or_insert_with(|| PreprintBatch::new(preprint_id))
    }

    fn drop_malformed(&mut self, err: ScienceError) {
        warn!(error = %err, "dropping malformed source record");
        self.malformed_dropped += 1;
    }

    fn push_author(&mut self, raw: &RawAuthor, source: MentionSource) {
        let preprint_id = match require_preprint_id(raw.preprint_id.as_deref(), source.as_str()) {
            Ok(id) => id,
            Err(err) => {
                self.drop_malformed(err);
                return;
            }
        };
        let batch = self.batch(&preprint_id);
        let position = batch.next_position(source);
        let mention = AuthorMention::new(&preprint_id, source, position)
            .with_name(
                raw.given_name.as_deref().unwrap_or_default(),
                raw.family_name.as_deref().unwrap_or_default(),
            )
            .with_identifier(normalize_identifier(raw.identifier.as_deref()).as_deref())
            .with_email(normalize_email(raw.email.as_deref()).as_deref());
        batch.mentions.push(mention);
    }

    fn push_tei(&mut self, doc: &TeiDocument) {
        let preprint_id = match require_preprint_id(doc.preprint_id.as_deref(), "xml") {
            Ok(id) => id,
            Err(err) => {
                self.drop_malformed(err);
                return;
            }
        };
        if self.batch(&preprint_id).mentions_from(MentionSource::Xml).next().is_some() {
            debug!(preprint_id = %preprint_id, "structured author records present, ignoring TEI");
            return;
        }
        let authors = match read_tei(doc) {
            Ok(authors) => authors,
            Err(err) => {
                warn!(preprint_id = %preprint_id, error = %err, "unreadable TEI document");
                self.notes.push((preprint_id, err.to_string()));
                return;
            }
        };
        for author in authors {
            let raw = RawAuthor {
                preprint_id: Some(preprint_id.clone()),
                given_name: Some(author.given_name),
                family_name: Some(author.family_name),
                email: author.email,
                identifier: author.orcid,
            };
            self.push_author(&raw, MentionSource::Xml);
        }
    }

    fn add_pool_emails<'a>(&mut self, preprint_id: &str, emails: impl Iterator<Item = &'a str>) {
        let batch = self.batch(preprint_id);
        let pool = batch
            .email_pool
            .get_or_insert_with(|| AuthorMention::new(preprint_id, MentionSource::PdfText, 0));
        pool.raw_candidate_emails
            .extend(emails.filter_map(|e| normalize_email(Some(e))));
    }

    fn finish(self) -> NormalizedInput {
        let mut batches: Vec<PreprintBatch> = self.batches.into_values().collect();
        for batch in &mut batches {
            // The pool takes the slot after the attributed pdf_text mentions.
            let position = batch.next_position(MentionSource::PdfText);
            if let Some(pool) = batch.email_pool.take() {
                let mut relocated =
                    AuthorMention::new(&batch.preprint_id, MentionSource::PdfText, position);
                relocated.raw_candidate_emails = pool.raw_candidate_emails;
                batch.email_pool = Some(relocated);
            }
        }
        NormalizedInput {
            batches,
            malformed_dropped: self.malformed_dropped,
            notes: self.notes,
        }
    }
}

fn require_preprint_id(value: Option<&str>, origin: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| ScienceError::MalformedSourceRecord {
        origin: origin.to_string(),
        reason: "missing preprint_id".to_string(),
    })
}

fn read_tei(doc: &TeiDocument) -> Result<Vec<TeiAuthor>> {
    let xml = match (&doc.xml, &doc.path) {
        (Some(xml), _) => xml.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(ScienceError::Parse(
                "TEI document has neither inline xml nor a path".to_string(),
            ));
        }
    };
    parse_tei_authors(&xml)
}

/// Split a free-text full name on its last whitespace: everything before is
/// the given name, the last token the family name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let collapsed = collapse_whitespace(full_name);
    match collapsed.rsplit_once(' ') {
        Some((given, family)) => (given.to_string(), family.to_string()),
        None => (String::new(), collapsed),
    }
}

pub fn platform_mention(
    preprint_id: &str,
    position: usize,
    full_name: &str,
    identifier: Option<&str>,
) -> AuthorMention {
    let (given, family) = split_full_name(full_name);
    AuthorMention::new(preprint_id, MentionSource::Platform, position)
        .with_name(&given, &family)
        .with_identifier(normalize_identifier(identifier).as_deref())
}

#[cfg(test)]
mod tests {
    use authorlink_core::{RawContributor, RawEmailPool};

    use super::*;

    fn raw(preprint: Option<&str>, given: &str, family: &str) -> RawAuthor {
        RawAuthor {
            preprint_id: preprint.map(ToOwned::to_owned),
            given_name: Some(given.to_string()),
            family_name: Some(family.to_string()),
            email: Some(String::new()),
            identifier: Some(String::new()),
        }
    }

    #[test]
    fn empty_strings_become_null() {
        let input = SourceInput {
            xml_authors: vec![raw(Some("P1"), "Jane", "Doe")],
            ..Default::default()
        };
        let out = normalize(&input);
        let mention = &out.batches[0].mentions[0];
        assert_eq!(mention.identifier(), None);
        assert_eq!(mention.email(), None);
        assert_eq!(mention.display_name(), "Jane Doe");
    }

    #[test]
    fn records_without_preprint_are_dropped_and_counted() {
        let input = SourceInput {
            xml_authors: vec![raw(None, "Jane", "Doe"), raw(Some("  "), "Bob", "Smith")],
            pdf_emails: vec![RawEmailPool {
                preprint_id: None,
                emails: vec!["x@y.org".to_string()],
            }],
            ..Default::default()
        };
        let out = normalize(&input);
        assert!(out.batches.is_empty());
        assert_eq!(out.malformed_dropped, 3);
    }

    #[test]
    fn positions_are_per_source_and_preprint() {
        let input = SourceInput {
            xml_authors: vec![
                raw(Some("P1"), "Jane", "Doe"),
                raw(Some("P2"), "Ann", "Lee"),
                raw(Some("P1"), "Bob", "Smith"),
            ],
            pdf_authors: vec![raw(Some("P1"), "Jane", "Doe")],
            ..Default::default()
        };
        let out = normalize(&input);
        let p1 = &out.batches[0];
        assert_eq!(p1.preprint_id, "P1");
        let positions: Vec<(MentionSource, usize)> =
            p1.mentions.iter().map(|m| (m.source(), m.position)).collect();
        assert_eq!(
            positions,
            vec![
                (MentionSource::Xml, 0),
                (MentionSource::Xml, 1),
                (MentionSource::PdfText, 0)
            ]
        );
    }

    #[test]
    fn platform_entries_split_names_and_queue_lookups() {
        let input = SourceInput {
            platform_contributors: vec![
                RawContributor {
                    preprint_id: Some("P1".to_string()),
                    contributor_id: Some("u1".to_string()),
                    full_name: Some("Mary  Ann Jones".to_string()),
                    identifier: Some("https://orcid.org/0000-0002-1825-0097".to_string()),
                },
                RawContributor {
                    preprint_id: Some("P1".to_string()),
                    contributor_id: Some("u2".to_string()),
                    full_name: None,
                    identifier: None,
                },
            ],
            ..Default::default()
        };
        let out = normalize(&input);
        let batch = &out.batches[0];
        assert!(!batch.discover_contributors);
        let mention = &batch.mentions[0];
        assert_eq!(mention.given_name, "Mary Ann");
        assert_eq!(mention.family_name, "Jones");
        assert_eq!(mention.identifier(), Some("0000-0002-1825-0097"));
        assert_eq!(
            batch.pending_contributors,
            vec![PendingContributor {
                position: 1,
                contributor_id: "u2".to_string()
            }]
        );
    }

    #[test]
    fn email_pool_follows_attributed_pdf_mentions() {
        let input = SourceInput {
            pdf_authors: vec![raw(Some("P1"), "Jane", "Doe")],
            pdf_emails: vec![RawEmailPool {
                preprint_id: Some("P1".to_string()),
                emails: vec![
                    "bsmith@uni.edu".to_string(),
                    " ".to_string(),
                    "jdoe@uni.edu".to_string(),
                ],
            }],
            ..Default::default()
        };
        let out = normalize(&input);
        let pool = out.batches[0].email_pool.as_ref().unwrap();
        assert_eq!(pool.position, 1);
        assert_eq!(pool.raw_candidate_emails.len(), 2);
        assert_eq!(out.batches[0].candidate_emails().map(|e| e.len()), Some(2));
    }

    #[test]
    fn structured_records_win_over_tei() {
        let input = SourceInput {
            xml_authors: vec![raw(Some("P1"), "Jane", "Doe")],
            tei_documents: vec![TeiDocument {
                preprint_id: Some("P1".to_string()),
                xml: Some("<TEI><teiHeader><fileDesc/></teiHeader></TEI>".to_string()),
                path: None,
            }],
            ..Default::default()
        };
        let out = normalize(&input);
        assert_eq!(out.batches[0].mentions.len(), 1);
    }

    #[test]
    fn unreadable_tei_is_noted() {
        let input = SourceInput {
            tei_documents: vec![TeiDocument {
                preprint_id: Some("P1".to_string()),
                xml: Some("garbage".to_string()),
                path: None,
            }],
            ..Default::default()
        };
        let out = normalize(&input);
        assert_eq!(out.notes.len(), 1);
        assert_eq!(out.notes[0].0, "P1");
        assert_eq!(out.malformed_dropped, 0);
    }

    #[test]
    fn single_token_full_name_is_family_name() {
        assert_eq!(split_full_name("Plato"), (String::new(), "Plato".to_string()));
    }

    #[tokio::test]
    async fn missing_pdf_is_noted_from_the_blocking_pool() {
        let input = SourceInput {
            xml_authors: vec![raw(Some("P1"), "Jane", "Doe")],
            pdf_files: vec![authorlink_core::PdfFile {
                preprint_id: Some("P1".to_string()),
                path: "/nonexistent/authorlink/P1.pdf".into(),
            }],
            ..Default::default()
        };
        let out = normalize_off_thread(&input).await.unwrap();
        assert_eq!(out.batches.len(), 1);
        assert_eq!(out.batches[0].mentions.len(), 1);
        assert_eq!(out.notes.len(), 1);
        assert_eq!(out.notes[0].0, "P1");
    }
}
