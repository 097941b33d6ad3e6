//! Configuration management
//!
//! Settings live in `settings.json` inside the bankmail directory:
//! ```json
//! {
//!   "emailReader": { "url": "http://email-reader:80", "mailbox": "inbox", "timeoutSecs": 120 },
//!   "ingestion": { "pageSize": 15, "processingThreads": 4, "retry": { "maxRetries": 0, "backoffMs": 200 } },
//!   "sources": [ { "id": "bac", "bankName": "BAC", "bankEmail": "...", "senders": ["..."], "parser": "bac" } ]
//! }
//! ```
//! Keys the CLI doesn't manage are kept when saving.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::email_reader::DEFAULT_EMAIL_READER_URL;
use crate::adapters::parser::ParserKind;
use crate::domain::Bank;
use crate::services::RetryPolicy;

pub const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    email_reader: EmailReaderSettings,
    #[serde(default)]
    ingestion: IngestionSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<SourceSettings>>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailReaderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mailbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processing_threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry: Option<RetryPolicy>,
}

/// One configured bank source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSettings {
    pub id: String,
    pub bank_name: String,
    pub bank_email: String,
    /// Sender addresses to query; defaults to `bank_email`
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub parser: ParserKind,
}

impl SourceSettings {
    /// Senders to query, falling back to the bank's own address
    pub fn effective_senders(&self) -> Vec<String> {
        if self.senders.is_empty() {
            vec![self.bank_email.clone()]
        } else {
            self.senders.clone()
        }
    }

    fn bac() -> Self {
        Self {
            id: "bac".to_string(),
            bank_name: Bank::Bac.name().to_string(),
            bank_email: Bank::Bac.email().to_string(),
            senders: vec![Bank::Bac.email().to_string()],
            subject: None,
            parser: ParserKind::Bac,
        }
    }

    fn promerica() -> Self {
        Self {
            id: "promerica".to_string(),
            bank_name: Bank::Promerica.name().to_string(),
            bank_email: Bank::Promerica.email().to_string(),
            senders: vec![Bank::Promerica.email().to_string()],
            subject: Some("Comprobante de".to_string()),
            parser: ParserKind::Promerica,
        }
    }
}

/// Bankmail configuration (resolved view of settings plus environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub email_reader_url: String,
    pub mailbox: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
    pub processing_threads: usize,
    pub retry: RetryPolicy,
    pub sources: Vec<SourceSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email_reader_url: DEFAULT_EMAIL_READER_URL.to_string(),
            mailbox: "inbox".to_string(),
            request_timeout_secs: 120,
            page_size: 15,
            processing_threads: 4,
            retry: RetryPolicy::none(),
            sources: vec![SourceSettings::bac(), SourceSettings::promerica()],
        }
    }
}

impl Config {
    /// Load config from the bankmail directory
    ///
    /// Environment overrides: `BANKMAIL_PAGE_SIZE`, `BANKMAIL_PROCESSING_THREADS`,
    /// `BANKMAIL_MAILBOX`, `BANKMAIL_EMAIL_READER_URL`.
    pub fn load(bankmail_dir: &Path) -> Result<Self> {
        Self::load_with_env(bankmail_dir, |key| std::env::var(key).ok())
    }

    fn load_with_env(bankmail_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(bankmail_dir)?;
        let defaults = Config::default();

        let mut config = Config {
            email_reader_url: raw.email_reader.url.unwrap_or(defaults.email_reader_url),
            mailbox: raw.email_reader.mailbox.unwrap_or(defaults.mailbox),
            request_timeout_secs: raw
                .email_reader
                .timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            page_size: raw.ingestion.page_size.unwrap_or(defaults.page_size),
            processing_threads: raw
                .ingestion
                .processing_threads
                .unwrap_or(defaults.processing_threads),
            retry: raw.ingestion.retry.unwrap_or(defaults.retry),
            sources: raw.sources.unwrap_or(defaults.sources),
        };

        if let Some(value) = env("BANKMAIL_PAGE_SIZE") {
            config.page_size = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid BANKMAIL_PAGE_SIZE '{}'", value))?;
        }
        if let Some(value) = env("BANKMAIL_PROCESSING_THREADS") {
            config.processing_threads = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid BANKMAIL_PROCESSING_THREADS '{}'", value))?;
        }
        if let Some(value) = env("BANKMAIL_MAILBOX").filter(|v| !v.trim().is_empty()) {
            config.mailbox = value;
        }
        if let Some(value) = env("BANKMAIL_EMAIL_READER_URL").filter(|v| !v.trim().is_empty()) {
            config.email_reader_url = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that could only fail once a pull is underway
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("Page size must be at least 1");
        }
        if self.processing_threads == 0 {
            bail!("Processing threads must be at least 1");
        }
        if self.sources.is_empty() {
            bail!("No sources configured");
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                bail!("Source id cannot be empty");
            }
            if !seen.insert(source.id.as_str()) {
                bail!("Duplicate source id '{}'", source.id);
            }
            if source.bank_email.trim().is_empty() {
                bail!("Source '{}' has no bank email", source.id);
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn source(&self, id: &str) -> Option<&SourceSettings> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Save config to the bankmail directory
    /// Preserves other settings that the CLI doesn't manage
    pub fn save(&self, bankmail_dir: &Path) -> Result<()> {
        let mut settings = read_settings(bankmail_dir)?;

        settings.email_reader.url = Some(self.email_reader_url.clone());
        settings.email_reader.mailbox = Some(self.mailbox.clone());
        settings.email_reader.timeout_secs = Some(self.request_timeout_secs);
        settings.ingestion.page_size = Some(self.page_size);
        settings.ingestion.processing_threads = Some(self.processing_threads);
        settings.ingestion.retry = Some(self.retry);
        settings.sources = Some(self.sources.clone());

        let settings_path = bankmail_dir.join(SETTINGS_FILE);
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }
}

fn read_settings(bankmail_dir: &Path) -> Result<SettingsFile> {
    let settings_path = bankmail_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read {}", settings_path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid settings file {}", settings_path.display()))
}
