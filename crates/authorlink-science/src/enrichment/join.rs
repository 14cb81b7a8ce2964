use authorlink_core::{AuthorMention, MentionSource};
use tracing::debug;

use crate::enrichment::matching::{SCORE_EPSILON, SimilarityMatrix, name_similarity};

/// A pair judged to describe the same person. `a` and `b` index the two
/// slices handed to [`FuzzyJoiner::join`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub a: usize,
    pub b: usize,
    pub similarity: f64,
    /// Maximum normalized distance in force when the pair was accepted.
    pub threshold: f64,
}

/// Aligns mentions of two sources by full-name edit distance.
#[derive(Debug, Clone)]
pub struct FuzzyJoiner {
    max_distance: f64,
}

impl Default for FuzzyJoiner {
    fn default() -> Self {
        Self { max_distance: 0.2 }
    }
}

impl FuzzyJoiner {
    pub fn new(max_distance: f64) -> Self {
        Self {
            max_distance: max_distance.clamp(0.0, 1.0),
        }
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Similarity of two mentions, or `None` when they can never match:
    /// different preprints or a missing name on either side.
    pub fn similarity(&self, a: &AuthorMention, b: &AuthorMention) -> Option<f64> {
        if a.preprint_id != b.preprint_id || !a.has_name() || !b.has_name() {
            return None;
        }
        Some(name_similarity(&a.display_name(), &b.display_name()))
    }

    /// One-to-one matches between `a` and `b`, ordered by `a`.
    ///
    /// Each `a` takes its closest `b` within the threshold (first on ties);
    /// when two `a`s want the same `b` the closer one keeps it.
    pub fn join(&self, a: &[&AuthorMention], b: &[&AuthorMention]) -> Vec<MatchCandidate> {
        let matrix = SimilarityMatrix::build(a, b, |x, y| {
            self.similarity(x, y).unwrap_or(f64::NEG_INFINITY)
        });
        let max_distance = self.max_distance;
        let picks = matrix.assign_unique(|sim| 1.0 - sim <= max_distance + SCORE_EPSILON);

        let matches: Vec<MatchCandidate> = picks
            .into_iter()
            .enumerate()
            .filter_map(|(ai, pick)| {
                pick.map(|(bi, similarity)| MatchCandidate {
                    a: ai,
                    b: bi,
                    similarity,
                    threshold: max_distance,
                })
            })
            .collect();

        debug!(
            left = a.len(),
            right = b.len(),
            matched = matches.len(),
            "fuzzy join"
        );
        matches
    }
}

/// The mentions that describe one author of one preprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    pub mentions: Vec<AuthorMention>,
}

impl Slot {
    fn with(mention: AuthorMention) -> Self {
        Self {
            mentions: vec![mention],
        }
    }

    /// The mention whose name stands for the slot during joins.
    pub fn representative(&self) -> Option<&AuthorMention> {
        self.mentions.iter().find(|m| m.has_name())
    }

    pub fn has_identifier(&self) -> bool {
        self.mentions.iter().any(|m| m.identifier().is_some())
    }

    pub fn has_identifier_value(&self, identifier: &str) -> bool {
        self.mentions.iter().any(|m| m.identifier() == Some(identifier))
    }

    pub fn has_source(&self, source: MentionSource) -> bool {
        self.mentions.iter().any(|m| m.source() == source)
    }
}

/// Group one preprint's mentions into author slots.
///
/// `xml` mentions open slots in document order. `platform` mentions join
/// them by name; named platform mentions left over open new slots.
/// Attributed `pdf_text` mentions join by name and are dropped when nothing
/// matches. `registry` mentions attach to the first slot holding their
/// identifier. An `xml` mention needs a name, identifier or email to open a
/// slot; nameless, identifier-less mentions of other sources (failed
/// lookups) never form one.
pub fn build_slots(mentions: &[AuthorMention], joiner: &FuzzyJoiner) -> Vec<Slot> {
    let by_source = |source: MentionSource| -> Vec<&AuthorMention> {
        let mut list: Vec<&AuthorMention> =
            mentions.iter().filter(|m| m.source() == source).collect();
        list.sort_by_key(|m| m.position);
        list
    };

    let mut slots: Vec<Slot> = Vec::new();
    for mention in by_source(MentionSource::Xml) {
        if mention.has_name() || mention.identifier().is_some() || mention.email().is_some() {
            slots.push(Slot::with(mention.clone()));
        } else {
            debug!(
                preprint_id = %mention.preprint_id,
                source = %mention.source(),
                position = mention.position,
                "empty mention opens no author slot"
            );
        }
    }

    for source in [MentionSource::Platform, MentionSource::PdfText] {
        let incoming = by_source(source);
        if incoming.is_empty() {
            continue;
        }
        let (slot_idx, reps): (Vec<usize>, Vec<&AuthorMention>) = slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.representative().map(|rep| (i, rep)))
            .unzip();
        let matches = joiner.join(&incoming, &reps);

        let mut matched = vec![false; incoming.len()];
        let mut attach: Vec<(usize, AuthorMention)> = Vec::new();
        for m in &matches {
            matched[m.a] = true;
            attach.push((slot_idx[m.b], incoming[m.a].clone()));
        }
        for (slot, mention) in attach {
            slots[slot].mentions.push(mention);
        }

        for (mention, was_matched) in incoming.into_iter().zip(matched) {
            if was_matched {
                continue;
            }
            if source == MentionSource::Platform && mention.has_name() {
                slots.push(Slot::with(mention.clone()));
            } else {
                debug!(
                    preprint_id = %mention.preprint_id,
                    source = %mention.source(),
                    position = mention.position,
                    "mention matched no author slot"
                );
            }
        }
    }

    for mention in by_source(MentionSource::Registry) {
        let Some(identifier) = mention.identifier() else {
            continue;
        };
        match slots.iter_mut().find(|s| s.has_identifier_value(identifier)) {
            Some(slot) => slot.mentions.push(mention.clone()),
            None => debug!(
                preprint_id = %mention.preprint_id,
                identifier,
                "registry record has no slot"
            ),
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(source: MentionSource, position: usize, given: &str, family: &str) -> AuthorMention {
        AuthorMention::new("P1", source, position).with_name(given, family)
    }

    #[test]
    fn join_is_deterministic_and_symmetric_in_score() {
        let joiner = FuzzyJoiner::default();
        let xml = [
            mention(MentionSource::Xml, 0, "Jane", "Doe"),
            mention(MentionSource::Xml, 1, "Bob", "Smith"),
        ];
        let platform = [
            mention(MentionSource::Platform, 0, "Bob", "Smith"),
            mention(MentionSource::Platform, 1, "Jane", "Doe"),
        ];
        let a: Vec<&AuthorMention> = xml.iter().collect();
        let b: Vec<&AuthorMention> = platform.iter().collect();

        let first = joiner.join(&a, &b);
        let second = joiner.join(&a, &b);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!((first[0].a, first[0].b), (0, 1));
        assert_eq!((first[1].a, first[1].b), (1, 0));

        for m in &first {
            assert_eq!(
                joiner.similarity(a[m.a], b[m.b]),
                joiner.similarity(b[m.b], a[m.a])
            );
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        // "abcdefghij" vs "abcdefghXY": distance 2/10 = 0.2 exactly.
        let joiner = FuzzyJoiner::new(0.2);
        let x = mention(MentionSource::Xml, 0, "", "abcdefghij");
        let y = mention(MentionSource::Platform, 0, "", "abcdefghXY");
        assert_eq!(joiner.join(&[&x], &[&y]).len(), 1);

        let strict = FuzzyJoiner::new(0.1);
        assert!(strict.join(&[&x], &[&y]).is_empty());
    }

    #[test]
    fn closest_candidate_wins_and_ties_take_first() {
        let joiner = FuzzyJoiner::new(0.3);
        let x = mention(MentionSource::Xml, 0, "Jon", "Doe");
        let near = mention(MentionSource::Platform, 0, "John", "Doe");
        let exact = mention(MentionSource::Platform, 1, "Jon", "Doe");
        let matches = joiner.join(&[&x], &[&near, &exact]);
        assert_eq!(matches[0].b, 1);

        let twin = mention(MentionSource::Platform, 2, "Jon", "Doe");
        let matches = joiner.join(&[&x], &[&exact, &twin]);
        assert_eq!(matches[0].b, 0);
    }

    #[test]
    fn different_preprints_never_match() {
        let joiner = FuzzyJoiner::default();
        let x = mention(MentionSource::Xml, 0, "Jane", "Doe");
        let y = AuthorMention::new("P2", MentionSource::Platform, 0).with_name("Jane", "Doe");
        assert!(joiner.join(&[&x], &[&y]).is_empty());
    }

    #[test]
    fn nameless_mentions_never_match() {
        let joiner = FuzzyJoiner::default();
        let x = mention(MentionSource::Xml, 0, "", "");
        let y = mention(MentionSource::Platform, 0, "", "");
        assert!(joiner.join(&[&x], &[&y]).is_empty());
    }

    #[test]
    fn slots_follow_xml_then_unmatched_platform() {
        let mentions = vec![
            mention(MentionSource::Xml, 0, "Jane", "Doe"),
            mention(MentionSource::Xml, 1, "Bob", "Smith"),
            mention(MentionSource::Platform, 0, "Carol", "White")
                .with_identifier(Some("0000-0001-5109-3700")),
            mention(MentionSource::Platform, 1, "Jane", "Doe").with_identifier(Some("abc123")),
            // Failed directory lookup: no name, no identifier.
            AuthorMention::new("P1", MentionSource::Platform, 2).with_error("timeout"),
            mention(MentionSource::PdfText, 0, "Robert", "Jones"),
            mention(MentionSource::Registry, 0, "Jane", "Doe")
                .with_identifier(Some("abc123"))
                .with_email(Some("jane@doe.org")),
        ];
        let slots = build_slots(&mentions, &FuzzyJoiner::default());

        assert_eq!(slots.len(), 3);
        let sources = |i: usize| -> Vec<MentionSource> {
            slots[i].mentions.iter().map(|m| m.source()).collect()
        };
        assert_eq!(
            sources(0),
            vec![MentionSource::Xml, MentionSource::Platform, MentionSource::Registry]
        );
        assert_eq!(sources(1), vec![MentionSource::Xml]);
        assert_eq!(sources(2), vec![MentionSource::Platform]);
        assert_eq!(slots[2].mentions[0].family_name, "White");
    }

    #[test]
    fn email_only_xml_row_keeps_its_slot() {
        let mentions = vec![
            mention(MentionSource::Xml, 0, "Jane", "Doe"),
            AuthorMention::new("P1", MentionSource::Xml, 1).with_email(Some("lab@uni.edu")),
            AuthorMention::new("P1", MentionSource::Xml, 2),
            mention(MentionSource::Platform, 0, "Jane", "Doe"),
        ];
        let slots = build_slots(&mentions, &FuzzyJoiner::default());

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].mentions.len(), 2);
        assert_eq!(slots[1].mentions.len(), 1);
        assert_eq!(slots[1].mentions[0].email(), Some("lab@uni.edu"));
        assert!(slots[1].representative().is_none());
    }
}
