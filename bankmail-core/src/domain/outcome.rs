//! Aggregated result of an ingestion run

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransactionId;

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    /// At least one source returned data
    Completed,
    /// Every source reported no content
    NothingFound,
    /// No source returned data and at least one could not be read
    Failed,
}

/// How a single source's first page was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Fetched,
    NoContent,
    Failed,
}

/// Per-source counters for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub status: SourceStatus,
    pub total_items: u64,
    pub fetch_calls: u32,
    pub missing_pages: Vec<u32>,
    pub skipped: u64,
    pub parse_errors: u64,
    pub persist_errors: u64,
    pub new: u64,
    pub existing: u64,
}

impl SourceReport {
    pub fn new(source: impl Into<String>, status: SourceStatus) -> Self {
        Self {
            source: source.into(),
            status,
            total_items: 0,
            fetch_calls: 0,
            missing_pages: Vec::new(),
            skipped: 0,
            parse_errors: 0,
            persist_errors: 0,
            new: 0,
            existing: 0,
        }
    }

    /// The source answered and had nothing to process
    pub fn is_empty(&self) -> bool {
        match self.status {
            SourceStatus::NoContent => true,
            SourceStatus::Fetched => self.total_items == 0,
            SourceStatus::Failed => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == SourceStatus::Failed
    }
}

/// Result of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub run_id: Uuid,
    pub status: IngestionStatus,
    pub total_found: u64,
    /// Identities stored by this run, in processing order
    pub new_entries: Vec<TransactionId>,
    /// Identities that were already stored
    pub existing_entries: Vec<TransactionId>,
    pub messages: Vec<String>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub sources: Vec<SourceReport>,
}

impl IngestionOutcome {
    pub fn parse_errors(&self) -> u64 {
        self.sources.iter().map(|s| s.parse_errors).sum()
    }

    pub fn persist_errors(&self) -> u64 {
        self.sources.iter().map(|s| s.persist_errors).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.sources.iter().map(|s| s.skipped).sum()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
