//! Bankmail Core - ingestion engine for bank notification emails
//!
//! This crate follows hexagonal architecture:
//!
//! - **domain**: Core entities (RawMessage, Transaction, IngestionOutcome, etc.)
//! - **ports**: Trait definitions for external dependencies (PageFetcher, TransactionStore, MessageParser)
//! - **services**: Business logic orchestration (paginator, ingestion, queries)
//! - **adapters**: Concrete implementations (DuckDB, email reader client, parsers)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod logging;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use adapters::duckdb::DuckDbTransactionStore;
use adapters::email_reader::EmailReaderClient;
use adapters::parser::LabeledMessageParser;
use adapters::preview::PreviewStore;
use config::Config;
use ports::{SourceQuery, TransactionStore};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    CandidateTransaction, DateRange, IngestionOutcome, IngestionStatus, RawMessage, SourceReport,
    SourceStatus, Transaction, TransactionFilter, TransactionId,
};

/// Database file inside the bankmail directory
pub const DB_FILENAME: &str = "bankmail.duckdb";

/// Per-run overrides for `bm pull`
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    pub page_size: Option<u32>,
    pub thread_count: Option<usize>,
    /// Report what would be stored without writing anything
    pub dry_run: bool,
}

/// Main context for bankmail operations
///
/// Holds the configuration, the database and the query services. The
/// ingestion service is built on demand because it depends on per-run
/// options.
pub struct BankmailContext {
    pub config: Config,
    pub bankmail_dir: PathBuf,
    pub store: Arc<DuckDbTransactionStore>,
    pub transaction_service: TransactionService,
    pub status_service: StatusService,
}

impl BankmailContext {
    /// Create a context from `settings.json` and the environment
    pub fn new(bankmail_dir: &Path) -> Result<Self> {
        let config = Config::load(bankmail_dir)?;
        Self::with_config(bankmail_dir, config)
    }

    pub fn with_config(bankmail_dir: &Path, config: Config) -> Result<Self> {
        config.validate()?;

        let db_path = bankmail_dir.join(DB_FILENAME);
        let store = Arc::new(
            DuckDbTransactionStore::open(&db_path)
                .with_context(|| format!("Failed to open {}", db_path.display()))?,
        );

        let dyn_store: Arc<dyn TransactionStore> = store.clone();
        let transaction_service = TransactionService::new(Arc::clone(&dyn_store));
        let status_service = StatusService::new(
            dyn_store,
            config
                .sources
                .iter()
                .map(|s| SourceSummarySpec {
                    id: s.id.clone(),
                    bank_email: s.bank_email.clone(),
                })
                .collect(),
        );

        Ok(Self {
            config,
            bankmail_dir: bankmail_dir.to_path_buf(),
            store,
            transaction_service,
            status_service,
        })
    }

    /// Configured sources with their parsers
    pub fn source_configs(&self) -> Result<Vec<SourceConfig>> {
        self.config
            .sources
            .iter()
            .map(|source| {
                let mut profile = source.parser.profile();
                profile.bank_name = source.bank_name.clone();
                profile.bank_email = source.bank_email.clone();
                let parser = LabeledMessageParser::new(profile)
                    .with_context(|| format!("Failed to build parser for '{}'", source.id))?;

                Ok(SourceConfig::new(
                    source.id.clone(),
                    SourceQuery::new(source.effective_senders(), source.subject.clone()),
                    Arc::new(parser),
                ))
            })
            .collect()
    }

    /// Ingestion service talking to the configured email reader
    pub fn ingestion_service(&self, options: &PullOptions) -> Result<IngestionService> {
        let fetcher = EmailReaderClient::new(
            &self.config.email_reader_url,
            &self.config.mailbox,
            self.config.request_timeout(),
        )?;

        let settings = IngestionSettings {
            page_size: options.page_size.unwrap_or(self.config.page_size),
            thread_count: options.thread_count.unwrap_or(self.config.processing_threads),
            retry: self.config.retry,
        };

        let store: Arc<dyn TransactionStore> = if options.dry_run {
            debug!("Dry run: transactions will not be written");
            Arc::new(PreviewStore::new(Arc::clone(&self.store)))
        } else {
            self.store.clone()
        };

        IngestionService::new(Arc::new(fetcher), store, self.source_configs()?, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_wires_configured_sources() {
        let dir = TempDir::new().unwrap();
        let ctx = BankmailContext::with_config(dir.path(), Config::default()).unwrap();

        assert!(dir.path().join(DB_FILENAME).exists());
        let sources = ctx.source_configs().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].query.subject.as_deref(), Some("Comprobante de"));

        let status = ctx.status_service.get_status().unwrap();
        assert_eq!(status.total_transactions, 0);
        assert_eq!(status.source_names, vec!["bac", "promerica"]);
    }

    #[test]
    fn test_ingestion_service_applies_overrides() {
        let dir = TempDir::new().unwrap();
        let ctx = BankmailContext::with_config(dir.path(), Config::default()).unwrap();

        let options = PullOptions {
            page_size: Some(0),
            ..Default::default()
        };
        assert!(ctx.ingestion_service(&options).is_err());

        let options = PullOptions {
            thread_count: Some(2),
            dry_run: true,
            ..Default::default()
        };
        let service = ctx.ingestion_service(&options).unwrap();
        assert_eq!(service.sources().len(), 2);
    }
}
