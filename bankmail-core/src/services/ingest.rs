//! Ingestion service - multi-source fetch, transform and idempotent persist
//!
//! Sources are processed one after another; within a source, pages after
//! the first are fetched concurrently by the [`ThreadedPaginator`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::domain::{
    DateRange, IngestionOutcome, IngestionStatus, PageDescriptor, PaginationDetails, RawMessage,
    SourceReport, SourceStatus, TransactionId,
};
use crate::ports::{
    CreateOutcome, FetchResponse, MessageParser, PageFetcher, ParseOutcome, SourceQuery,
    TransactionStore,
};
use crate::services::paginator::{RetryPolicy, ThreadedPaginator};

/// One configured upstream source
#[derive(Clone)]
pub struct SourceConfig {
    /// Stable identifier (e.g. "bac")
    pub id: String,
    pub query: SourceQuery,
    pub parser: Arc<dyn MessageParser>,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, query: SourceQuery, parser: Arc<dyn MessageParser>) -> Self {
        Self {
            id: id.into(),
            query,
            parser,
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("id", &self.id)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Tuning knobs for a run
#[derive(Debug, Clone, Copy)]
pub struct IngestionSettings {
    pub page_size: u32,
    pub thread_count: usize,
    pub retry: RetryPolicy,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            page_size: 15,
            thread_count: 4,
            retry: RetryPolicy::none(),
        }
    }
}

/// Messages and identities collected while a run progresses
#[derive(Default)]
struct RunLedger {
    messages: Vec<String>,
    new_entries: Vec<TransactionId>,
    existing_entries: Vec<TransactionId>,
}

/// Orchestrates ingestion over every configured source
pub struct IngestionService {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn TransactionStore>,
    sources: Vec<SourceConfig>,
    settings: IngestionSettings,
}

impl IngestionService {
    /// Create the service, rejecting configurations that could only fail mid-run
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn TransactionStore>,
        sources: Vec<SourceConfig>,
        settings: IngestionSettings,
    ) -> Result<Self> {
        if sources.is_empty() {
            bail!("At least one source must be configured");
        }
        let mut seen = HashSet::new();
        for source in &sources {
            if source.id.trim().is_empty() {
                bail!("Source id cannot be empty");
            }
            if !seen.insert(source.id.as_str()) {
                bail!("Duplicate source id '{}'", source.id);
            }
        }
        if settings.page_size == 0 {
            bail!("Page size must be at least 1");
        }
        if settings.thread_count == 0 {
            bail!("Thread count must be at least 1");
        }

        Ok(Self {
            fetcher,
            store,
            sources,
            settings,
        })
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Ingest every configured source for `range`
    pub fn run(&self, range: &DateRange) -> IngestionOutcome {
        let selected: Vec<&SourceConfig> = self.sources.iter().collect();
        self.run_sources(range, &selected)
    }

    /// Ingest only the named sources, in configuration order
    ///
    /// Unknown ids are rejected before anything is fetched.
    pub fn run_only(&self, range: &DateRange, source_ids: &[String]) -> Result<IngestionOutcome> {
        if source_ids.is_empty() {
            bail!("No sources selected");
        }
        for id in source_ids {
            if !self.sources.iter().any(|s| &s.id == id) {
                let known: Vec<&str> = self.sources.iter().map(|s| s.id.as_str()).collect();
                bail!("Unknown source '{}' (configured: {})", id, known.join(", "));
            }
        }

        let selected: Vec<&SourceConfig> = self
            .sources
            .iter()
            .filter(|s| source_ids.contains(&s.id))
            .collect();
        Ok(self.run_sources(range, &selected))
    }

    fn run_sources(&self, range: &DateRange, sources: &[&SourceConfig]) -> IngestionOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", %run_id);
        let _entered = span.enter();

        info!(sources = sources.len(), range = %range, "Starting ingestion run");

        let mut ledger = RunLedger::default();
        let mut reports = Vec::with_capacity(sources.len());
        let mut elapsed = Duration::ZERO;

        for source in sources {
            let started = Instant::now();
            let report = self.ingest_source(source, range, &mut ledger);
            elapsed += started.elapsed();
            reports.push(report);
        }

        let status = if reports.iter().all(SourceReport::is_empty) {
            ledger
                .messages
                .push(format!("No transactions found from {}", range));
            IngestionStatus::NothingFound
        } else if reports.iter().all(|r| r.is_empty() || r.is_failed()) {
            let failed = reports.iter().filter(|r| r.is_failed()).count();
            ledger.messages.push(format!(
                "No transactions retrieved: {} of {} source(s) failed",
                failed,
                reports.len()
            ));
            IngestionStatus::Failed
        } else {
            IngestionStatus::Completed
        };

        let outcome = IngestionOutcome {
            run_id,
            status,
            total_found: reports.iter().map(|r| r.total_items).sum(),
            new_entries: ledger.new_entries,
            existing_entries: ledger.existing_entries,
            messages: ledger.messages,
            elapsed,
            sources: reports,
        };

        info!(
            status = ?outcome.status,
            total_found = outcome.total_found,
            new = outcome.new_entries.len(),
            existing = outcome.existing_entries.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Ingestion run finished"
        );

        outcome
    }

    fn ingest_source(
        &self,
        source: &SourceConfig,
        range: &DateRange,
        ledger: &mut RunLedger,
    ) -> SourceReport {
        let fetch_calls = AtomicU32::new(0);
        let fetch = |page: PageDescriptor| {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.fetcher.fetch_page(&source.query, range, page)
        };

        let first = match PageDescriptor::first(self.settings.page_size) {
            Ok(page) => page,
            Err(e) => {
                ledger.messages.push(format!("{}: {}", source.id, e));
                return SourceReport::new(&source.id, SourceStatus::Failed);
            }
        };

        let first_page = match fetch(first) {
            Ok(FetchResponse::Page(page)) => page,
            Ok(FetchResponse::NoContent { message }) => {
                info!(source = %source.id, "No content: {}", message);
                ledger.messages.push(format!("{}: {}", source.id, message));
                let mut report = SourceReport::new(&source.id, SourceStatus::NoContent);
                report.fetch_calls = fetch_calls.load(Ordering::SeqCst);
                return report;
            }
            Err(e) => {
                error!(source = %source.id, error = %e, "Failed to fetch first page");
                ledger
                    .messages
                    .push(format!("{}: failed to fetch first page: {}", source.id, e));
                let mut report = SourceReport::new(&source.id, SourceStatus::Failed);
                report.fetch_calls = fetch_calls.load(Ordering::SeqCst);
                return report;
            }
        };

        let total_items = first_page.pagination.total_items;
        if total_items == 0 {
            info!(source = %source.id, "Source reported zero items");
            ledger
                .messages
                .push(format!("{}: no messages found from {}", source.id, range));
            let mut report = SourceReport::new(&source.id, SourceStatus::NoContent);
            report.fetch_calls = fetch_calls.load(Ordering::SeqCst);
            return report;
        }

        // Page numbering follows the page size the source actually used
        let page_size = match first_page.pagination.page_size {
            0 => self.settings.page_size,
            n => n,
        };
        let details = match PaginationDetails::new(total_items, page_size) {
            Ok(details) => details,
            Err(e) => {
                error!(source = %source.id, error = %e, "Rejected reported result size");
                ledger.messages.push(format!("{}: {}", source.id, e));
                let mut report = SourceReport::new(&source.id, SourceStatus::Failed);
                report.fetch_calls = fetch_calls.load(Ordering::SeqCst);
                return report;
            }
        };

        info!(
            source = %source.id,
            total_items,
            total_pages = details.total_pages(),
            "Fetched first page"
        );

        let run = ThreadedPaginator::new(
            |page: PageDescriptor| -> crate::domain::result::Result<Option<Vec<RawMessage>>> {
                match fetch(page)? {
                    FetchResponse::Page(p) => Ok(Some(p.items)),
                    FetchResponse::NoContent { .. } => Ok(None),
                }
            },
            details,
            self.settings.thread_count,
            Some(first_page.items),
        )
        .with_retry(self.settings.retry)
        .with_label(source.id.clone())
        .run();

        let mut report = SourceReport::new(&source.id, SourceStatus::Fetched);
        report.total_items = total_items;
        report.missing_pages = run.missing_pages;

        if !report.missing_pages.is_empty() {
            ledger.messages.push(format!(
                "{}: {} page(s) could not be fetched: {:?}",
                source.id,
                report.missing_pages.len(),
                report.missing_pages
            ));
        }

        for message in &run.items {
            self.process_message(source, message, &mut report, ledger);
        }

        report.fetch_calls = fetch_calls.load(Ordering::SeqCst);
        let mut summary = format!(
            "{}: found {} message(s) from {}; {} new, {} existing",
            source.id,
            run.items.len(),
            range,
            report.new,
            report.existing
        );
        if report.skipped > 0 {
            summary.push_str(&format!(", {} skipped", report.skipped));
        }
        if report.parse_errors > 0 {
            summary.push_str(&format!(", {} unreadable", report.parse_errors));
        }
        if report.persist_errors > 0 {
            summary.push_str(&format!(", {} failed to store", report.persist_errors));
        }
        ledger.messages.push(summary);

        info!(
            source = %source.id,
            items = run.items.len(),
            new = report.new,
            existing = report.existing,
            skipped = report.skipped,
            parse_errors = report.parse_errors,
            persist_errors = report.persist_errors,
            "Source processed"
        );

        report
    }

    fn process_message(
        &self,
        source: &SourceConfig,
        message: &RawMessage,
        report: &mut SourceReport,
        ledger: &mut RunLedger,
    ) {
        let candidate = match source.parser.parse(message) {
            Ok(ParseOutcome::Candidate(candidate)) => candidate,
            Ok(ParseOutcome::Skip(reason)) => {
                debug!(source = %source.id, reason = %reason, "Skipping message");
                report.skipped += 1;
                return;
            }
            Err(e) => {
                warn!(
                    source = %source.id,
                    error = %e,
                    message = %message.describe(),
                    "Failed to parse message"
                );
                report.parse_errors += 1;
                return;
            }
        };

        let id = candidate.identity();
        match self.store.create(&candidate, &id) {
            Ok(CreateOutcome::Created(_)) => {
                report.new += 1;
                ledger.new_entries.push(id);
            }
            Ok(CreateOutcome::AlreadyExists(_)) => {
                debug!(source = %source.id, id = %id, "Transaction already stored");
                report.existing += 1;
                ledger.existing_entries.push(id);
            }
            Err(e) => {
                error!(source = %source.id, id = %id, error = %e, "Failed to persist transaction");
                report.persist_errors += 1;
                ledger
                    .messages
                    .push(format!("{}: failed to store transaction {}: {}", source.id, id, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTransactionStore;
    use crate::domain::result::Result as DomainResult;

    struct EmptyFetcher;

    impl PageFetcher for EmptyFetcher {
        fn fetch_page(
            &self,
            _source: &SourceQuery,
            _range: &DateRange,
            _page: PageDescriptor,
        ) -> DomainResult<FetchResponse> {
            Ok(FetchResponse::NoContent {
                message: "nothing".to_string(),
            })
        }
    }

    struct NeverParser;

    impl MessageParser for NeverParser {
        fn parse(&self, _message: &RawMessage) -> DomainResult<ParseOutcome> {
            Ok(ParseOutcome::Skip("never".to_string()))
        }
    }

    fn source(id: &str) -> SourceConfig {
        SourceConfig::new(id, SourceQuery::default(), Arc::new(NeverParser))
    }

    fn service(sources: Vec<SourceConfig>, settings: IngestionSettings) -> Result<IngestionService> {
        IngestionService::new(
            Arc::new(EmptyFetcher),
            Arc::new(InMemoryTransactionStore::new()),
            sources,
            settings,
        )
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        assert!(service(vec![], IngestionSettings::default()).is_err());
        assert!(service(vec![source("bac"), source("bac")], IngestionSettings::default()).is_err());
        let zero_page = IngestionSettings {
            page_size: 0,
            ..Default::default()
        };
        assert!(service(vec![source("bac")], zero_page).is_err());
        let zero_threads = IngestionSettings {
            thread_count: 0,
            ..Default::default()
        };
        assert!(service(vec![source("bac")], zero_threads).is_err());
    }

    #[test]
    fn test_run_only_rejects_unknown_source() {
        let svc = service(vec![source("bac")], IngestionSettings::default()).unwrap();
        let err = svc
            .run_only(&DateRange::unbounded(), &["siman".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("Unknown source 'siman'"));
    }

    #[test]
    fn test_run_only_selects_subset() {
        let svc = service(
            vec![source("bac"), source("promerica")],
            IngestionSettings::default(),
        )
        .unwrap();
        let outcome = svc
            .run_only(&DateRange::unbounded(), &["promerica".to_string()])
            .unwrap();
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].source, "promerica");
        assert_eq!(outcome.status, IngestionStatus::NothingFound);
    }
}
