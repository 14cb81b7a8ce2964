use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Where an author mention was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionSource {
    /// Author table produced by the document-structuring service (TEI XML).
    Xml,
    /// Hosting platform contributor directory.
    Platform,
    /// Researcher-identifier registry, looked up by identifier.
    Registry,
    /// Strings scraped from the raw document text.
    PdfText,
    /// Registry search by surname and given name.
    NameLookup,
}

impl MentionSource {
    pub const ALL: [MentionSource; 5] = [
        Self::Xml,
        Self::Platform,
        Self::Registry,
        Self::PdfText,
        Self::NameLookup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Platform => "platform",
            Self::Registry => "registry",
            Self::PdfText => "pdf_text",
            Self::NameLookup => "name_lookup",
        }
    }
}

impl fmt::Display for MentionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MentionSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == wanted)
            .ok_or_else(|| CoreError::UnknownSource(s.to_string()))
    }
}

/// A consolidated field that several sources may disagree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Identifier,
    Email,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier => f.write_str("identifier"),
            Self::Email => f.write_str("email"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_serializes_snake_case() {
        let json = serde_json::to_string(&MentionSource::PdfText).unwrap();
        assert_eq!(json, "\"pdf_text\"");
        let back: MentionSource = serde_json::from_str("\"name_lookup\"").unwrap();
        assert_eq!(back, MentionSource::NameLookup);
    }

    #[test]
    fn source_from_str_is_case_insensitive() {
        assert_eq!("Platform".parse::<MentionSource>().unwrap(), MentionSource::Platform);
        assert!("orcid".parse::<MentionSource>().is_err());
    }

    #[test]
    fn display_matches_wire_name() {
        for source in MentionSource::ALL {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json.trim_matches('"'), source.to_string());
        }
    }
}
