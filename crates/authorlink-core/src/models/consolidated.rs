use serde::{Deserialize, Serialize};

use super::source::{Field, MentionSource};

/// A recorded disagreement between two sources on one field of one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub field: Field,
    pub value_a: String,
    pub source_a: MentionSource,
    pub value_b: String,
    pub source_b: MentionSource,
}

/// One row per `(preprint_id, position)` after merging every source.
///
/// Values and their sources are only set together, so `identifier_source` is
/// present exactly when `identifier` is (same for `email`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedAuthor {
    pub preprint_id: String,
    pub position: usize,
    pub given_name: String,
    pub family_name: String,
    identifier: Option<String>,
    identifier_source: Option<MentionSource>,
    email: Option<String>,
    email_source: Option<MentionSource>,
    conflicts: Vec<Conflict>,
}

impl ConsolidatedAuthor {
    pub fn new(
        preprint_id: impl Into<String>,
        position: usize,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        Self {
            preprint_id: preprint_id.into(),
            position,
            given_name: given_name.into(),
            family_name: family_name.into(),
            identifier: None,
            identifier_source: None,
            email: None,
            email_source: None,
            conflicts: Vec::new(),
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn identifier_source(&self) -> Option<MentionSource> {
        self.identifier_source
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn email_source(&self) -> Option<MentionSource> {
        self.email_source
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn display_name(&self) -> String {
        super::mention::join_name(&self.given_name, &self.family_name)
    }

    pub fn set_identifier(&mut self, value: impl Into<String>, source: MentionSource) {
        self.identifier = Some(value.into());
        self.identifier_source = Some(source);
    }

    pub fn set_email(&mut self, value: impl Into<String>, source: MentionSource) {
        self.email = Some(value.into());
        self.email_source = Some(source);
    }

    /// Set the email only if none is present yet. Returns whether it was set.
    pub fn fill_email(&mut self, value: impl Into<String>, source: MentionSource) -> bool {
        if self.email.is_some() {
            return false;
        }
        self.set_email(value, source);
        true
    }

    pub fn push_conflict(&mut self, conflict: Conflict) {
        self.conflicts.push(conflict);
    }

    /// Whether value/source pairs are consistent. Always true for rows built
    /// through the setters; useful on rows read back from disk.
    pub fn is_consistent(&self) -> bool {
        self.identifier.is_some() == self.identifier_source.is_some()
            && self.email.is_some() == self.email_source.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_email_never_overwrites() {
        let mut row = ConsolidatedAuthor::new("P1", 0, "Jane", "Doe");
        assert!(row.fill_email("jane@doe.org", MentionSource::Registry));
        assert!(!row.fill_email("other@doe.org", MentionSource::PdfText));
        assert_eq!(row.email(), Some("jane@doe.org"));
        assert_eq!(row.email_source(), Some(MentionSource::Registry));
    }

    #[test]
    fn absent_fields_serialize_as_null() {
        let row = ConsolidatedAuthor::new("P1", 0, "Jane", "Doe");
        let json = serde_json::to_value(&row).unwrap();
        assert!(json["identifier"].is_null());
        assert!(json["identifier_source"].is_null());
        assert!(json["email"].is_null());
        assert!(json["email_source"].is_null());
        assert_eq!(json["conflicts"], serde_json::json!([]));
    }

    #[test]
    fn inconsistent_row_is_detected() {
        let json = r#"{
            "preprint_id": "P1", "position": 0, "given_name": "Jane", "family_name": "Doe",
            "identifier": "abc", "identifier_source": null,
            "email": null, "email_source": null, "conflicts": []
        }"#;
        let row: ConsolidatedAuthor = serde_json::from_str(json).unwrap();
        assert!(!row.is_consistent());
    }
}
