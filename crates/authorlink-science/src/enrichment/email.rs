use std::collections::{BTreeSet, HashSet};

use authorlink_core::{ConsolidatedAuthor, EmailConfig, MentionSource};
use tracing::debug;

use crate::enrichment::matching::{SCORE_EPSILON, SimilarityMatrix, normalized_distance};

/// A pool email handed to an author row.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailAssignment {
    pub position: usize,
    pub email: String,
    pub score: f64,
}

/// Matches unattributed emails scraped from the document to authors by
/// comparing each surname with the email's local part.
#[derive(Debug, Clone)]
pub struct EmailAssigner {
    min_score: f64,
    length_ratio_weight: f64,
}

impl Default for EmailAssigner {
    fn default() -> Self {
        Self::from_config(&EmailConfig::default())
    }
}

impl EmailAssigner {
    pub fn new(min_score: f64, length_ratio_weight: f64) -> Self {
        Self {
            min_score,
            length_ratio_weight,
        }
    }

    pub fn from_config(config: &EmailConfig) -> Self {
        Self::new(config.min_score, config.length_ratio_weight)
    }

    /// `(1 - distance(surname, local)) * (len(surname) / len(local))^weight`,
    /// both sides lower-cased. `None` when either side is empty or the
    /// candidate is not an address.
    pub fn score(&self, family_name: &str, email: &str) -> Option<f64> {
        let surname = family_name.trim().to_lowercase();
        let local = email.split_once('@')?.0.trim().to_lowercase();
        if surname.is_empty() || local.is_empty() {
            return None;
        }
        let similarity = 1.0 - normalized_distance(&surname, &local);
        let ratio = surname.chars().count() as f64 / local.chars().count() as f64;
        Some(similarity * ratio.powf(self.length_ratio_weight))
    }

    /// Fill missing emails of `rows` (one preprint) from `pool`.
    ///
    /// Addresses already held by any row are withdrawn from the pool first.
    /// Rows are scored against the pool in sorted order; when two rows pick
    /// the same address the higher score keeps it and the earlier row wins a
    /// tie.
    pub fn assign(
        &self,
        rows: &mut [ConsolidatedAuthor],
        pool: &BTreeSet<String>,
    ) -> Vec<EmailAssignment> {
        let taken: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.email())
            .map(str::to_lowercase)
            .collect();
        let candidates: Vec<&String> = pool
            .iter()
            .filter(|email| !taken.contains(&email.to_lowercase()))
            .collect();

        let needy: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.email().is_none() && !row.family_name.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() || needy.is_empty() {
            return Vec::new();
        }

        let matrix = SimilarityMatrix::build(&needy, &candidates, |row, email| {
            self.score(&rows[*row].family_name, email)
                .unwrap_or(f64::NEG_INFINITY)
        });
        let min_score = self.min_score;
        let picks = matrix.assign_unique(|score| score >= min_score - SCORE_EPSILON);

        let mut assignments = Vec::new();
        for (row_idx, pick) in needy.into_iter().zip(picks) {
            let Some((col, score)) = pick else {
                continue;
            };
            let email = candidates[col].clone();
            let row = &mut rows[row_idx];
            if row.fill_email(email.as_str(), MentionSource::PdfText) {
                debug!(
                    preprint_id = %row.preprint_id,
                    position = row.position,
                    email = %email,
                    score,
                    "assigned pool email"
                );
                assignments.push(EmailAssignment {
                    position: row.position,
                    email,
                    score,
                });
            }
        }
        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(emails: &[&str]) -> BTreeSet<String> {
        emails.iter().map(|e| e.to_string()).collect()
    }

    fn row(position: usize, given: &str, family: &str) -> ConsolidatedAuthor {
        ConsolidatedAuthor::new("P2", position, given, family)
    }

    #[test]
    fn score_is_length_adjusted() {
        let assigner = EmailAssigner::default();
        let doe = assigner.score("Doe", "jdoe@uni.edu").unwrap();
        assert!((doe - 0.5625).abs() < 1e-9);
        let doerr = assigner.score("Doerr", "jdoe@uni.edu").unwrap();
        assert!((doerr - 0.5).abs() < 1e-9);
        assert_eq!(assigner.score("", "jdoe@uni.edu"), None);
        assert_eq!(assigner.score("Doe", "not-an-address"), None);

        let flat = EmailAssigner::new(0.5, 0.0);
        assert!((flat.score("Doe", "jdoe@uni.edu").unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn each_author_gets_their_own_address() {
        let mut rows = vec![row(0, "Jane", "Doe"), row(1, "Bob", "Smith")];
        let assigned =
            EmailAssigner::default().assign(&mut rows, &pool(&["jdoe@uni.edu", "bsmith@uni.edu"]));

        assert_eq!(assigned.len(), 2);
        assert_eq!(rows[0].email(), Some("jdoe@uni.edu"));
        assert_eq!(rows[1].email(), Some("bsmith@uni.edu"));
        assert_eq!(rows[0].email_source(), Some(MentionSource::PdfText));
    }

    #[test]
    fn contested_address_goes_to_higher_score() {
        let mut rows = vec![row(0, "Max", "Doerr"), row(1, "Jane", "Doe")];
        let assigned = EmailAssigner::default().assign(&mut rows, &pool(&["jdoe@x.org"]));

        assert_eq!(assigned.len(), 1);
        assert_eq!(rows[0].email(), None);
        assert_eq!(rows[1].email(), Some("jdoe@x.org"));
    }

    #[test]
    fn tie_goes_to_earlier_row() {
        let mut rows = vec![row(0, "A", "Doe"), row(1, "B", "Doe")];
        EmailAssigner::default().assign(&mut rows, &pool(&["doe@x.org"]));
        assert_eq!(rows[0].email(), Some("doe@x.org"));
        assert_eq!(rows[1].email(), None);
    }

    #[test]
    fn held_addresses_are_withdrawn_case_insensitively() {
        let mut rows = vec![row(0, "Jane", "Doe"), row(1, "John", "Doe")];
        rows[0].set_email("JDoe@Uni.edu", MentionSource::Xml);
        let assigned = EmailAssigner::default().assign(&mut rows, &pool(&["jdoe@uni.edu"]));
        assert!(assigned.is_empty());
        assert_eq!(rows[1].email(), None);
    }

    #[test]
    fn existing_emails_and_blank_surnames_are_left_alone() {
        let mut rows = vec![row(0, "Jane", ""), row(1, "Bob", "Smith")];
        rows[1].set_email("bob@lab.org", MentionSource::Registry);
        let assigned = EmailAssigner::default().assign(&mut rows, &pool(&["smith@x.org"]));
        assert!(assigned.is_empty());
        assert_eq!(rows[1].email(), Some("bob@lab.org"));
    }

    #[test]
    fn weak_matches_stay_null() {
        let mut rows = vec![row(0, "Jane", "Doe")];
        EmailAssigner::default().assign(&mut rows, &pool(&["info@conference.org"]));
        assert_eq!(rows[0].email(), None);
    }

    #[test]
    fn never_hands_one_address_to_two_rows() {
        let mut rows = vec![
            row(0, "A", "Lee"),
            row(1, "B", "Lee"),
            row(2, "C", "Li"),
            row(3, "D", "Leigh"),
        ];
        EmailAssigner::default().assign(&mut rows, &pool(&["lee@x.org", "li@x.org"]));
        let emails: Vec<&str> = rows.iter().filter_map(|r| r.email()).collect();
        let distinct: HashSet<&str> = emails.iter().copied().collect();
        assert_eq!(emails.len(), distinct.len());
    }
}
