use crate::error::{Result, ScienceError};
use serde::{Deserialize, Serialize};

/// A checksum-validated ORCID iD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Orcid {
    pub raw: String,
    /// `0000-0000-0000-000X` form, checksum character upper-cased.
    pub normalized: String,
    pub url: String,
}

impl Orcid {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let stripped = [
            "https://orcid.org/",
            "http://orcid.org/",
            "https://www.orcid.org/",
            "orcid.org/",
            "ORCID:",
            "orcid:",
        ]
        .iter()
        .find_map(|prefix| input.strip_prefix(prefix))
        .unwrap_or(input)
        .trim()
        .trim_end_matches('/');

        let compact: String = stripped.chars().filter(|c| *c != '-').collect();
        if compact.len() != 16 || !compact.is_ascii() {
            return Err(ScienceError::InvalidOrcid(input.to_string()));
        }
        let compact = compact.to_ascii_uppercase();
        let (body, check) = compact.split_at(15);
        if !body.chars().all(|c| c.is_ascii_digit()) {
            return Err(ScienceError::InvalidOrcid(input.to_string()));
        }
        // Hyphens, when present, must sit at the canonical positions.
        if stripped.contains('-') {
            let hyphens: Vec<usize> = stripped.match_indices('-').map(|(i, _)| i).collect();
            if hyphens != [4, 9, 14] {
                return Err(ScienceError::InvalidOrcid(input.to_string()));
            }
        }
        if Some(checksum_char(body)) != check.chars().next() {
            return Err(ScienceError::InvalidOrcid(input.to_string()));
        }

        let normalized = format!(
            "{}-{}-{}-{}",
            &compact[0..4],
            &compact[4..8],
            &compact[8..12],
            &compact[12..16]
        );
        let url = format!("https://orcid.org/{normalized}");

        Ok(Self {
            raw: input.to_string(),
            normalized,
            url,
        })
    }
}

/// ISO 7064 MOD 11-2 check character over the first 15 digits.
fn checksum_char(digits: &str) -> char {
    let total = digits
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .fold(0u32, |acc, d| (acc + d) * 2);
    match (12 - total % 11) % 11 {
        10 => 'X',
        n => char::from(b'0' + n as u8),
    }
}
