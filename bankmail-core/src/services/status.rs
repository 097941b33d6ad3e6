//! Status service - stored transaction summaries

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::domain::TransactionFilter;
use crate::ports::TransactionStore;

/// Status service for store summaries
pub struct StatusService {
    store: Arc<dyn TransactionStore>,
    sources: Vec<SourceSummarySpec>,
}

/// What the status service needs to know about a configured source
#[derive(Debug, Clone)]
pub struct SourceSummarySpec {
    pub id: String,
    pub bank_email: String,
}

impl StatusService {
    pub fn new(store: Arc<dyn TransactionStore>, sources: Vec<SourceSummarySpec>) -> Self {
        Self { store, sources }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let total_transactions = self.store.count(&TransactionFilter::default())?;
        let (earliest, latest) = self.store.date_bounds()?;

        let mut sources = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let filter = TransactionFilter {
                bank_email: Some(source.bank_email.clone()),
                ..Default::default()
            };
            sources.push(SourceCount {
                id: source.id.clone(),
                bank_email: source.bank_email.clone(),
                transactions: self.store.count(&filter)?,
            });
        }

        Ok(StatusSummary {
            total_transactions,
            source_names: self.sources.iter().map(|s| s.id.clone()).collect(),
            sources,
            date_range: DateBounds {
                earliest: earliest.map(|ts| ts.to_rfc3339()),
                latest: latest.map(|ts| ts.to_rfc3339()),
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_transactions: u64,
    pub source_names: Vec<String>,
    pub sources: Vec<SourceCount>,
    pub date_range: DateBounds,
}

#[derive(Debug, Serialize)]
pub struct SourceCount {
    pub id: String,
    pub bank_email: String,
    pub transactions: u64,
}

#[derive(Debug, Serialize)]
pub struct DateBounds {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTransactionStore;
    use crate::domain::CandidateTransaction;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn candidate(email: &str, day: u32) -> CandidateTransaction {
        CandidateTransaction {
            bank_name: "Bank".to_string(),
            bank_email: email.to_string(),
            business: "SHOP".to_string(),
            business_type: None,
            currency_code: "USD".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 7, day, 10, 0, 0).unwrap(),
            amount: Decimal::new(500, 2),
            raw_body: String::new(),
            priority: None,
            category: None,
        }
    }

    #[test]
    fn test_status_counts_per_source() {
        let store = Arc::new(InMemoryTransactionStore::new());
        for c in [
            candidate("a@bank.test", 1),
            candidate("a@bank.test", 2),
            candidate("b@bank.test", 5),
        ] {
            store.create(&c, &c.identity()).unwrap();
        }

        let svc = StatusService::new(
            store,
            vec![
                SourceSummarySpec {
                    id: "a".to_string(),
                    bank_email: "a@bank.test".to_string(),
                },
                SourceSummarySpec {
                    id: "b".to_string(),
                    bank_email: "b@bank.test".to_string(),
                },
            ],
        );

        let status = svc.get_status().unwrap();
        assert_eq!(status.total_transactions, 3);
        assert_eq!(status.source_names, vec!["a", "b"]);
        assert_eq!(status.sources[0].transactions, 2);
        assert_eq!(status.sources[1].transactions, 1);
        assert_eq!(
            status.date_range.earliest.as_deref(),
            Some("2024-07-01T10:00:00+00:00")
        );
    }

    #[test]
    fn test_empty_store() {
        let svc = StatusService::new(Arc::new(InMemoryTransactionStore::new()), vec![]);
        let status = svc.get_status().unwrap();
        assert_eq!(status.total_transactions, 0);
        assert!(status.date_range.latest.is_none());
    }
}
