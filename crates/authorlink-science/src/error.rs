use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("malformed {origin} record: {reason}")]
    MalformedSourceRecord { origin: String, reason: String },

    #[error("invalid ORCID iD: {0}")]
    InvalidOrcid(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transient failure from {service} after {attempts} attempts: {message}")]
    TransientService {
        service: String,
        attempts: u32,
        message: String,
    },

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("not found in {0}: {1}")]
    NotFound(String, String),

    #[error("ambiguous lookup for {query}: {candidates} candidates")]
    AmbiguousLookup { query: String, candidates: usize },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] authorlink_core::CoreError),
}

impl ScienceError {
    /// Network or service failures that a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientService { .. } | Self::Http(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(..) | Self::InvalidOrcid(_))
    }
}

pub type Result<T> = std::result::Result<T, ScienceError>;
