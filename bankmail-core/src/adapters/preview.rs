//! Dry-run store: answers like the wrapped store but never writes

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::{
    CandidateTransaction, PageDescriptor, Transaction, TransactionFilter, TransactionId,
};
use crate::ports::{CreateOutcome, TransactionStore};

/// Wraps a store for `pull --dry-run`
///
/// `create` reports `AlreadyExists` for ids already stored or already seen
/// during this preview; everything else is reported `Created` without being
/// written. Reads go straight to the wrapped store.
pub struct PreviewStore<S> {
    inner: S,
    seen: Mutex<HashSet<TransactionId>>,
}

impl<S: TransactionStore> PreviewStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of ids that would have been created
    pub fn would_create(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: TransactionStore> TransactionStore for PreviewStore<S> {
    fn create(
        &self,
        candidate: &CandidateTransaction,
        id: &TransactionId,
    ) -> Result<CreateOutcome> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| Error::database("Preview lock poisoned"))?;

        if seen.contains(id) || self.inner.get(id)?.is_some() {
            return Ok(CreateOutcome::AlreadyExists(id.clone()));
        }
        seen.insert(id.clone());
        Ok(CreateOutcome::Created(Transaction::from_candidate(
            id.clone(),
            candidate,
        )))
    }

    fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.inner.get(id)
    }

    fn list(
        &self,
        filter: &TransactionFilter,
        page: PageDescriptor,
    ) -> Result<(Vec<Transaction>, u64)> {
        self.inner.list(filter, page)
    }

    fn count(&self, filter: &TransactionFilter) -> Result<u64> {
        self.inner.count(filter)
    }

    fn date_bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        self.inner.date_bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTransactionStore;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn candidate(amount: i64) -> CandidateTransaction {
        CandidateTransaction {
            bank_name: "Promerica".to_string(),
            bank_email: "info@promerica.fi.cr".to_string(),
            business: "FARMACIA".to_string(),
            business_type: None,
            currency_code: "USD".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            amount: Decimal::new(amount, 2),
            raw_body: String::new(),
            priority: None,
            category: None,
        }
    }

    #[test]
    fn test_preview_never_writes() {
        let inner = InMemoryTransactionStore::new();
        let stored = candidate(100);
        inner.create(&stored, &stored.identity()).unwrap();

        let preview = PreviewStore::new(inner);
        let fresh = candidate(200);

        assert!(matches!(
            preview.create(&stored, &stored.identity()).unwrap(),
            CreateOutcome::AlreadyExists(_)
        ));
        assert!(preview.create(&fresh, &fresh.identity()).unwrap().is_created());
        // Second sighting within the same preview counts as existing
        assert!(matches!(
            preview.create(&fresh, &fresh.identity()).unwrap(),
            CreateOutcome::AlreadyExists(_)
        ));
        assert_eq!(preview.would_create(), 1);

        let inner = preview.into_inner();
        assert_eq!(inner.len(), 1);
        assert!(!inner.contains(&fresh.identity()));
    }
}
