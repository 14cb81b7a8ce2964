use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use super::source::MentionSource;

/// One author as seen from exactly one source on one preprint.
///
/// `preprint_id + source + position` identifies a mention. The source is fixed
/// at construction, and `identifier`/`email` only go through setters that map
/// blank strings to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorMention {
    pub preprint_id: String,
    source: MentionSource,
    pub position: usize,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    identifier: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    email: Option<String>,
    #[serde(default)]
    pub raw_candidate_emails: BTreeSet<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthorMention {
    pub fn new(preprint_id: impl Into<String>, source: MentionSource, position: usize) -> Self {
        Self {
            preprint_id: preprint_id.into(),
            source,
            position,
            given_name: String::new(),
            family_name: String::new(),
            identifier: None,
            email: None,
            raw_candidate_emails: BTreeSet::new(),
            error: None,
        }
    }

    pub fn with_name(mut self, given: &str, family: &str) -> Self {
        self.given_name = collapse_whitespace(given);
        self.family_name = collapse_whitespace(family);
        self
    }

    pub fn with_identifier(mut self, identifier: Option<&str>) -> Self {
        self.set_identifier(identifier);
        self
    }

    pub fn with_email(mut self, email: Option<&str>) -> Self {
        self.set_email(email);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn source(&self) -> MentionSource {
        self.source
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn set_identifier(&mut self, identifier: Option<&str>) {
        self.identifier = non_blank(identifier);
    }

    pub fn set_email(&mut self, email: Option<&str>) {
        self.email = non_blank(email);
    }

    /// Given and family name joined by a single space. Used for matching only.
    pub fn display_name(&self) -> String {
        join_name(&self.given_name, &self.family_name)
    }

    pub fn has_name(&self) -> bool {
        !self.given_name.is_empty() || !self.family_name.is_empty()
    }
}

/// Trim a value and map the empty string to `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

pub fn join_name(given: &str, family: &str) -> String {
    collapse_whitespace(&format!("{given} {family}"))
}

pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(non_blank(value.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifier_and_email_become_none() {
        let mention = AuthorMention::new("P1", MentionSource::Xml, 0)
            .with_identifier(Some(""))
            .with_email(Some("   "));
        assert_eq!(mention.identifier(), None);
        assert_eq!(mention.email(), None);
    }

    #[test]
    fn values_are_trimmed() {
        let mention = AuthorMention::new("P1", MentionSource::Xml, 0)
            .with_identifier(Some(" abc123 "))
            .with_email(Some("jane@doe.org\n"));
        assert_eq!(mention.identifier(), Some("abc123"));
        assert_eq!(mention.email(), Some("jane@doe.org"));
    }

    #[test]
    fn display_name_uses_single_space() {
        let mention = AuthorMention::new("P1", MentionSource::Xml, 0).with_name("  Jane  Q.", "Doe ");
        assert_eq!(mention.display_name(), "Jane Q. Doe");

        let family_only = AuthorMention::new("P1", MentionSource::Xml, 1).with_name("", "Doe");
        assert_eq!(family_only.display_name(), "Doe");
    }

    #[test]
    fn deserialized_blank_strings_are_null() {
        let json = r#"{
            "preprint_id": "P1",
            "source": "xml",
            "position": 0,
            "given_name": "Jane",
            "family_name": "Doe",
            "identifier": "",
            "email": ""
        }"#;
        let mention: AuthorMention = serde_json::from_str(json).unwrap();
        assert_eq!(mention.identifier(), None);
        assert_eq!(mention.email(), None);
        assert_eq!(mention.source(), MentionSource::Xml);
    }
}
