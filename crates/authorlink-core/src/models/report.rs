use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::consolidated::ConsolidatedAuthor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Aborted { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub preprints_total: usize,
    pub preprints_completed: usize,
    pub malformed_dropped: usize,
    pub transient_failures: usize,
    pub ambiguous_lookups: usize,
    pub conflicts: usize,
    pub identifiers_resolved: usize,
    pub emails_resolved: usize,
    pub emails_assigned_from_pool: usize,
}

/// A per-preprint annotation: something degraded but did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprintNote {
    pub preprint_id: String,
    pub message: String,
}

/// Result of one pipeline run.
///
/// `authors` holds only rows of fully processed preprints, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: RunOutcome,
    pub stats: RunStats,
    pub notes: Vec<PreprintNote>,
    pub authors: Vec<ConsolidatedAuthor>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: RunOutcome::Completed,
            stats: RunStats::default(),
            notes: Vec::new(),
            authors: Vec::new(),
        }
    }

    pub fn note(&mut self, preprint_id: &str, message: impl Into<String>) {
        self.notes.push(PreprintNote {
            preprint_id: preprint_id.to_string(),
            message: message.into(),
        });
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}
