//! Transaction service - lookups, listings and manual creation

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{
    CandidateTransaction, Cursor, Page, PageDescriptor, PageMeta, Transaction, TransactionFilter,
    TransactionId,
};
use crate::ports::{CreateOutcome, TransactionStore};

/// Which page of a listing to return
#[derive(Debug, Clone)]
pub enum PageRequest {
    /// Explicit page number and size
    Page(PageDescriptor),
    /// Opaque cursor from a previous listing
    Cursor(String),
}

impl PageRequest {
    fn resolve(&self) -> Result<PageDescriptor> {
        match self {
            PageRequest::Page(page) => Ok(*page),
            PageRequest::Cursor(token) => Cursor::decode(token)?.descriptor(),
        }
    }
}

pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.store.get(id)
    }

    /// One page of stored transactions with next/previous cursors
    pub fn list(
        &self,
        filter: &TransactionFilter,
        request: &PageRequest,
    ) -> Result<Page<Transaction>> {
        let page = request.resolve()?;
        let (items, total) = self.store.list(filter, page)?;
        Ok(Page {
            items,
            pagination: PageMeta::new(page, total),
        })
    }

    /// Store a single candidate; a duplicate identity is an error here
    pub fn create(&self, candidate: &CandidateTransaction) -> Result<Transaction> {
        let id = candidate.identity();
        match self.store.create(candidate, &id)? {
            CreateOutcome::Created(tx) => Ok(tx),
            CreateOutcome::AlreadyExists(id) => Err(Error::AlreadyExists(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTransactionStore;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn candidate(minute: u32) -> CandidateTransaction {
        CandidateTransaction {
            bank_name: "BAC".to_string(),
            bank_email: "notificacion@notificacionesbaccr.com".to_string(),
            business: format!("SHOP {:02}", minute),
            business_type: None,
            currency_code: "CRC".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 2, 10, 9, minute, 0).unwrap(),
            amount: Decimal::new(1000, 2),
            raw_body: String::new(),
            priority: None,
            category: None,
        }
    }

    fn service() -> TransactionService {
        TransactionService::new(Arc::new(InMemoryTransactionStore::new()))
    }

    #[test]
    fn test_create_duplicate_is_error() {
        let svc = service();
        let tx = svc.create(&candidate(1)).unwrap();
        assert_eq!(svc.get(&tx.id).unwrap(), Some(tx.clone()));

        match svc.create(&candidate(1)) {
            Err(Error::AlreadyExists(id)) => assert_eq!(id, tx.id.to_string()),
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
    }

    #[test]
    fn test_list_follows_cursors() {
        let svc = service();
        for minute in 0..5 {
            svc.create(&candidate(minute)).unwrap();
        }

        let filter = TransactionFilter::default();
        let first = svc
            .list(&filter, &PageRequest::Page(PageDescriptor::new(1, 2).unwrap()))
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.pagination.total_items, 5);
        assert_eq!(first.pagination.total_pages, 3);

        let next = first.pagination.next_cursor.clone().unwrap();
        let second = svc.list(&filter, &PageRequest::Cursor(next)).unwrap();
        assert_eq!(second.pagination.page, 2);
        assert_ne!(first.items[0].id, second.items[0].id);

        let prev = second.pagination.prev_cursor.clone().unwrap();
        let back = svc.list(&filter, &PageRequest::Cursor(prev)).unwrap();
        assert_eq!(back.items, first.items);
    }

    #[test]
    fn test_bad_cursor_is_validation_error() {
        let err = service()
            .list(&TransactionFilter::default(), &PageRequest::Cursor("%%%".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
