//! Ingestion run reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one document during an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Indexed { chunks: u64 },
    Failed { error: String, chunks_written: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source_id: String,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

/// Aggregate result of an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub documents: Vec<DocumentReport>,
    pub total_documents: u64,
    pub chunks_written: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionReport {
    pub fn start(total_documents: usize) -> Self {
        let now = Utc::now();
        Self {
            documents: Vec::with_capacity(total_documents),
            total_documents: total_documents as u64,
            chunks_written: 0,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn record_success(&mut self, source_id: &str, chunks: u64) {
        self.chunks_written += chunks;
        self.documents.push(DocumentReport {
            source_id: source_id.to_string(),
            outcome: DocumentOutcome::Indexed { chunks },
        });
    }

    pub fn record_failure(&mut self, source_id: &str, error: String, chunks_written: u64) {
        self.chunks_written += chunks_written;
        self.documents.push(DocumentReport {
            source_id: source_id.to_string(),
            outcome: DocumentOutcome::Failed {
                error,
                chunks_written,
            },
        });
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, DocumentOutcome::Indexed { .. }))
    }

    /// Source ids to re-trigger ingestion for.
    pub fn failed_sources(&self) -> Vec<&str> {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, DocumentOutcome::Failed { .. }))
            .map(|d| d.source_id.as_str())
            .collect()
    }

    /// Documents never reached because the run was cancelled.
    pub fn unprocessed(&self) -> u64 {
        self.total_documents
            .saturating_sub(self.documents.len() as u64)
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed_sources().is_empty()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
