use authorlink_core::{
    AuthorMention, Conflict, ConsolidatedAuthor, Field, MentionSource, PrecedenceConfig,
};

use crate::enrichment::join::Slot;

/// Sources consulted for the display name, best first.
pub const NAME_PRECEDENCE: [MentionSource; 5] = [
    MentionSource::Xml,
    MentionSource::Platform,
    MentionSource::Registry,
    MentionSource::PdfText,
    MentionSource::NameLookup,
];

/// Per-field source priority. A lower index wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityMerger {
    identifier: Vec<MentionSource>,
    email: Vec<MentionSource>,
}

impl Default for PriorityMerger {
    fn default() -> Self {
        Self::from_config(&PrecedenceConfig::default())
    }
}

impl PriorityMerger {
    pub fn from_config(config: &PrecedenceConfig) -> Self {
        Self {
            identifier: config.identifier.clone(),
            email: config.email.clone(),
        }
    }

    /// Rank of `source` for `field`, `None` when the source never supplies it.
    pub fn priority(&self, field: Field, source: MentionSource) -> Option<usize> {
        self.order(field).iter().position(|s| *s == source)
    }

    fn order(&self, field: Field) -> &[MentionSource] {
        match field {
            Field::Identifier => &self.identifier,
            Field::Email => &self.email,
        }
    }

    /// Collapse one slot into its output row.
    pub fn merge(&self, preprint_id: &str, position: usize, slot: &Slot) -> ConsolidatedAuthor {
        let (given, family) = pick_name(&slot.mentions);
        let mut row = ConsolidatedAuthor::new(preprint_id, position, given, family);

        let identifiers = self.candidates(Field::Identifier, &slot.mentions);
        for conflict in conflicts(Field::Identifier, &identifiers) {
            row.push_conflict(conflict);
        }
        if let Some((value, source)) = identifiers.first() {
            row.set_identifier(value.as_str(), *source);
        }

        let emails = self.candidates(Field::Email, &slot.mentions);
        for conflict in conflicts(Field::Email, &emails) {
            row.push_conflict(conflict);
        }
        if let Some((value, source)) = emails.first() {
            row.set_email(value.as_str(), *source);
        }

        row
    }

    /// Non-null values for `field` in precedence order, then mention position.
    fn candidates(&self, field: Field, mentions: &[AuthorMention]) -> Vec<(String, MentionSource)> {
        let mut ranked: Vec<(usize, usize, String, MentionSource)> = mentions
            .iter()
            .filter_map(|m| {
                let rank = self.priority(field, m.source())?;
                let value = match field {
                    Field::Identifier => m.identifier(),
                    Field::Email => m.email(),
                }?;
                Some((rank, m.position, value.trim().to_string(), m.source()))
            })
            .collect();
        ranked.sort_by_key(|(rank, position, _, _)| (*rank, *position));
        ranked
            .into_iter()
            .map(|(_, _, value, source)| (value, source))
            .collect()
    }
}

fn conflicts(field: Field, candidates: &[(String, MentionSource)]) -> Vec<Conflict> {
    let mut out = Vec::new();
    for (i, (value_a, source_a)) in candidates.iter().enumerate() {
        for (value_b, source_b) in &candidates[i + 1..] {
            if value_a != value_b {
                out.push(Conflict {
                    field,
                    value_a: value_a.clone(),
                    source_a: *source_a,
                    value_b: value_b.clone(),
                    source_b: *source_b,
                });
            }
        }
    }
    out
}

fn pick_name(mentions: &[AuthorMention]) -> (String, String) {
    NAME_PRECEDENCE
        .iter()
        .find_map(|source| {
            mentions
                .iter()
                .filter(|m| m.source() == *source && m.has_name())
                .min_by_key(|m| m.position)
        })
        .map(|m| (m.given_name.clone(), m.family_name.clone()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(mentions: Vec<AuthorMention>) -> Slot {
        Slot { mentions }
    }

    #[test]
    fn xml_email_beats_pdf_text_and_records_conflict() {
        let merged = PriorityMerger::default().merge(
            "P1",
            0,
            &slot(vec![
                AuthorMention::new("P1", MentionSource::PdfText, 0)
                    .with_name("J.", "Doe")
                    .with_email(Some("j.doe@gmail.com")),
                AuthorMention::new("P1", MentionSource::Xml, 0)
                    .with_name("Jane", "Doe")
                    .with_email(Some("jane@doe.org")),
            ]),
        );

        assert_eq!(merged.email(), Some("jane@doe.org"));
        assert_eq!(merged.email_source(), Some(MentionSource::Xml));
        assert_eq!(merged.given_name, "Jane");
        assert_eq!(
            merged.conflicts(),
            &[Conflict {
                field: Field::Email,
                value_a: "jane@doe.org".to_string(),
                source_a: MentionSource::Xml,
                value_b: "j.doe@gmail.com".to_string(),
                source_b: MentionSource::PdfText,
            }]
        );
    }

    #[test]
    fn platform_identifier_outranks_xml() {
        let merged = PriorityMerger::default().merge(
            "P1",
            0,
            &slot(vec![
                AuthorMention::new("P1", MentionSource::Xml, 0)
                    .with_name("Jane", "Doe")
                    .with_identifier(Some("0000-0002-1825-0097")),
                AuthorMention::new("P1", MentionSource::Platform, 0)
                    .with_name("Jane Doe", "")
                    .with_identifier(Some("0000-0002-1825-0097")),
            ]),
        );
        assert_eq!(merged.identifier(), Some("0000-0002-1825-0097"));
        assert_eq!(merged.identifier_source(), Some(MentionSource::Platform));
        assert!(merged.conflicts().is_empty());
    }

    #[test]
    fn xml_identifier_beats_pdf_text_and_records_conflict() {
        let merged = PriorityMerger::default().merge(
            "P1",
            0,
            &slot(vec![
                AuthorMention::new("P1", MentionSource::PdfText, 0)
                    .with_name("J.", "Doe")
                    .with_identifier(Some("0000-0001-5109-3700")),
                AuthorMention::new("P1", MentionSource::Xml, 0)
                    .with_name("Jane", "Doe")
                    .with_identifier(Some("0000-0002-1825-0097")),
            ]),
        );

        assert_eq!(merged.identifier(), Some("0000-0002-1825-0097"));
        assert_eq!(merged.identifier_source(), Some(MentionSource::Xml));
        assert_eq!(
            merged.conflicts(),
            &[Conflict {
                field: Field::Identifier,
                value_a: "0000-0002-1825-0097".to_string(),
                source_a: MentionSource::Xml,
                value_b: "0000-0001-5109-3700".to_string(),
                source_b: MentionSource::PdfText,
            }]
        );
    }

    #[test]
    fn platform_identifier_wins_disagreement_with_xml() {
        let merged = PriorityMerger::default().merge(
            "P1",
            0,
            &slot(vec![
                AuthorMention::new("P1", MentionSource::Xml, 0)
                    .with_name("Jane", "Doe")
                    .with_identifier(Some("0000-0002-1825-0097")),
                AuthorMention::new("P1", MentionSource::Platform, 0)
                    .with_name("Jane Doe", "")
                    .with_identifier(Some("0000-0001-5109-3700")),
            ]),
        );

        assert_eq!(merged.identifier(), Some("0000-0001-5109-3700"));
        assert_eq!(merged.identifier_source(), Some(MentionSource::Platform));
        assert_eq!(merged.conflicts().len(), 1);
        let conflict = &merged.conflicts()[0];
        assert_eq!(conflict.field, Field::Identifier);
        assert_eq!(
            (conflict.source_a, conflict.source_b),
            (MentionSource::Platform, MentionSource::Xml)
        );
        assert_eq!(conflict.value_b, "0000-0002-1825-0097");
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let merged = PriorityMerger::default().merge(
            "P1",
            0,
            &slot(vec![
                AuthorMention::new("P1", MentionSource::Xml, 0).with_email(Some("Jane@Doe.org")),
                AuthorMention::new("P1", MentionSource::Registry, 0).with_email(Some("jane@doe.org")),
            ]),
        );
        assert_eq!(merged.conflicts().len(), 1);
    }

    #[test]
    fn three_way_disagreement_lists_every_pair() {
        let merged = PriorityMerger::default().merge(
            "P1",
            0,
            &slot(vec![
                AuthorMention::new("P1", MentionSource::Xml, 0).with_email(Some("a@x.org")),
                AuthorMention::new("P1", MentionSource::Registry, 0).with_email(Some("b@x.org")),
                AuthorMention::new("P1", MentionSource::PdfText, 0).with_email(Some("a@x.org")),
            ]),
        );
        let pairs: Vec<(MentionSource, MentionSource)> = merged
            .conflicts()
            .iter()
            .map(|c| (c.source_a, c.source_b))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (MentionSource::Xml, MentionSource::Registry),
                (MentionSource::Registry, MentionSource::PdfText),
            ]
        );
    }

    #[test]
    fn sources_outside_the_order_are_ignored() {
        let merger = PriorityMerger::from_config(&PrecedenceConfig {
            identifier: vec![MentionSource::Xml],
            email: vec![MentionSource::Registry],
        });
        let merged = merger.merge(
            "P1",
            3,
            &slot(vec![
                AuthorMention::new("P1", MentionSource::Platform, 0)
                    .with_name("Bob", "Smith")
                    .with_identifier(Some("abc123")),
                AuthorMention::new("P1", MentionSource::Xml, 0).with_email(Some("bob@x.org")),
            ]),
        );
        assert_eq!(merged.position, 3);
        assert_eq!(merged.identifier(), None);
        assert_eq!(merged.email(), None);
        assert_eq!(merged.family_name, "Smith");
        assert!(merged.is_consistent());
    }
}
