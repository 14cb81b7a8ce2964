pub mod extract;
pub mod orcid;

pub use extract::{TextScan, extract_emails_from_text, extract_orcids_from_text, scan_pdf, scan_text};
pub use orcid::Orcid;

/// Canonical ORCID form when the value parses as one, otherwise the trimmed
/// value as an opaque identifier. Blank input yields `None`.
pub fn normalize_identifier(value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    Some(
        Orcid::parse(value)
            .map(|orcid| orcid.normalized)
            .unwrap_or_else(|_| value.to_string()),
    )
}

/// Trimmed email without a `mailto:` prefix. Blank input yields `None`.
pub fn normalize_email(value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim)?;
    let value = value
        .strip_prefix("mailto:")
        .or_else(|| value.strip_prefix("MAILTO:"))
        .unwrap_or(value)
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_normalization() {
        assert_eq!(normalize_identifier(Some("")), None);
        assert_eq!(normalize_identifier(None), None);
        assert_eq!(normalize_identifier(Some(" abc123 ")).as_deref(), Some("abc123"));
        assert_eq!(
            normalize_identifier(Some("https://orcid.org/0000-0002-1825-0097")).as_deref(),
            Some("0000-0002-1825-0097")
        );
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email(Some("  ")), None);
        assert_eq!(normalize_email(Some("mailto:jane@doe.org")).as_deref(), Some("jane@doe.org"));
        assert_eq!(normalize_email(Some("mailto:")), None);
    }
}
