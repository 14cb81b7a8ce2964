use std::collections::BTreeSet;
use std::path::Path;

use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};
use crate::identifiers::orcid::Orcid;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

static ORCID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{4}-\d{4}-\d{3}[\dXx]\b").expect("valid regex"));

/// Email-like and ORCID-like strings found in a document's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextScan {
    pub emails: BTreeSet<String>,
    pub orcids: BTreeSet<String>,
}

pub fn extract_emails_from_text(text: &str) -> BTreeSet<String> {
    EMAIL_REGEX
        .find_iter(text)
        .map(|m| m.as_str().trim_start_matches('.').to_string())
        .filter(|email| !email.starts_with('@'))
        .collect()
}

/// ORCID iDs with a valid checksum, in normalized form.
pub fn extract_orcids_from_text(text: &str) -> BTreeSet<String> {
    ORCID_REGEX
        .find_iter(text)
        .filter_map(|m| Orcid::parse(m.as_str()).ok())
        .map(|orcid| orcid.normalized)
        .collect()
}

pub fn scan_text(text: &str) -> TextScan {
    TextScan {
        emails: extract_emails_from_text(text),
        orcids: extract_orcids_from_text(text),
    }
}

/// Text of every page, in page order.
pub fn extract_pdf_text(pdf_path: &Path) -> Result<String> {
    let document = Document::load(pdf_path).map_err(|err| {
        ScienceError::PdfExtraction(format!("failed to open {}: {err}", pdf_path.display()))
    })?;
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(ScienceError::PdfExtraction(format!(
            "{} has no pages",
            pdf_path.display()
        )));
    }
    document.extract_text(&page_numbers).map_err(|err| {
        ScienceError::PdfExtraction(format!(
            "lopdf failed to extract text from {}: {err}",
            pdf_path.display()
        ))
    })
}

pub fn scan_pdf(pdf_path: &Path) -> Result<TextScan> {
    let text = extract_pdf_text(pdf_path)?;
    Ok(scan_text(&text))
}
