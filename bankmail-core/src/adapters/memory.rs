//! In-memory transaction store, used for tests and previews

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::{
    CandidateTransaction, PageDescriptor, Transaction, TransactionFilter, TransactionId,
};
use crate::ports::{CreateOutcome, TransactionStore};

/// Listing order shared by every store: day desc, business asc, amount desc
pub(crate) fn listing_order(a: &Transaction, b: &Transaction) -> Ordering {
    b.timestamp
        .date_naive()
        .cmp(&a.timestamp.date_naive())
        .then_with(|| a.business.cmp(&b.business))
        .then_with(|| b.amount.cmp(&a.amount))
        .then_with(|| a.id.cmp(&b.id))
}

pub(crate) fn matches_filter(tx: &Transaction, filter: &TransactionFilter) -> bool {
    filter.date_range.contains(tx.timestamp)
        && filter
            .bank_email
            .as_deref()
            .map_or(true, |email| tx.bank_email.eq_ignore_ascii_case(email))
}

/// Transaction store backed by a `HashMap`
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    rows: Mutex<HashMap<TransactionId, Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<TransactionId, Transaction>>> {
        self.rows
            .lock()
            .map_err(|_| Error::database("In-memory store lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.rows().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is stored
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.rows().map(|rows| rows.contains_key(id)).unwrap_or(false)
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn create(
        &self,
        candidate: &CandidateTransaction,
        id: &TransactionId,
    ) -> Result<CreateOutcome> {
        let mut rows = self.rows()?;
        if rows.contains_key(id) {
            return Ok(CreateOutcome::AlreadyExists(id.clone()));
        }
        let tx = Transaction::from_candidate(id.clone(), candidate);
        rows.insert(id.clone(), tx.clone());
        Ok(CreateOutcome::Created(tx))
    }

    fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        Ok(self.rows()?.get(id).cloned())
    }

    fn list(
        &self,
        filter: &TransactionFilter,
        page: PageDescriptor,
    ) -> Result<(Vec<Transaction>, u64)> {
        let rows = self.rows()?;
        let mut matching: Vec<&Transaction> =
            rows.values().filter(|tx| matches_filter(tx, filter)).collect();
        matching.sort_by(|a, b| listing_order(a, b));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    fn count(&self, filter: &TransactionFilter) -> Result<u64> {
        let rows = self.rows()?;
        Ok(rows.values().filter(|tx| matches_filter(tx, filter)).count() as u64)
    }

    fn date_bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let rows = self.rows()?;
        let earliest = rows.values().map(|tx| tx.timestamp).min();
        let latest = rows.values().map(|tx| tx.timestamp).max();
        Ok((earliest, latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::thread;

    fn candidate(business: &str, amount: i64, day: u32, hour: u32) -> CandidateTransaction {
        CandidateTransaction {
            bank_name: "BAC".to_string(),
            bank_email: "notificacion@notificacionesbaccr.com".to_string(),
            business: business.to_string(),
            business_type: None,
            currency_code: "CRC".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
            amount: Decimal::new(amount, 2),
            raw_body: String::new(),
            priority: None,
            category: None,
        }
    }

    #[test]
    fn test_create_is_idempotent() {
        let store = InMemoryTransactionStore::new();
        let c = candidate("SUPER", 1000, 1, 9);
        let id = c.identity();
        assert!(store.create(&c, &id).unwrap().is_created());
        assert_eq!(
            store.create(&c, &id).unwrap(),
            CreateOutcome::AlreadyExists(id.clone())
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_creates_yield_one_created() {
        let store = Arc::new(InMemoryTransactionStore::new());
        let c = candidate("SUPER", 1000, 1, 9);
        let id = c.identity();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let c = c.clone();
                let id = id.clone();
                thread::spawn(move || store.create(&c, &id).unwrap().is_created())
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(created, 1);
    }

    #[test]
    fn test_list_order_and_paging() {
        let store = InMemoryTransactionStore::new();
        for c in [
            candidate("B-SHOP", 500, 1, 8),
            candidate("A-SHOP", 100, 1, 20),
            candidate("A-SHOP", 900, 1, 7),
            candidate("Z-SHOP", 100, 2, 6),
        ] {
            store.create(&c, &c.identity()).unwrap();
        }

        let page = PageDescriptor::new(1, 3).unwrap();
        let (items, total) = store.list(&TransactionFilter::default(), page).unwrap();
        assert_eq!(total, 4);
        let order: Vec<(&str, Decimal)> =
            items.iter().map(|t| (t.business.as_str(), t.amount)).collect();
        assert_eq!(
            order,
            vec![
                ("Z-SHOP", Decimal::new(100, 2)),
                ("A-SHOP", Decimal::new(900, 2)),
                ("A-SHOP", Decimal::new(100, 2)),
            ]
        );

        let (rest, _) = store
            .list(&TransactionFilter::default(), PageDescriptor::new(2, 3).unwrap())
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].business, "B-SHOP");
    }
}
