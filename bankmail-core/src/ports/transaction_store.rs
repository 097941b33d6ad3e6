//! Transaction store port - persistence abstraction

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::result::Result;
use crate::domain::{
    CandidateTransaction, PageDescriptor, Transaction, TransactionFilter, TransactionId,
};

/// Result of an idempotent create
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Transaction),
    AlreadyExists(TransactionId),
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Transaction store trait
///
/// `create` is keyed by identity: at most one caller ever observes
/// `Created` for a given id, even when called concurrently.
pub trait TransactionStore: Send + Sync {
    /// Persist a candidate under `id`, or report that the id is already stored
    fn create(&self, candidate: &CandidateTransaction, id: &TransactionId)
        -> Result<CreateOutcome>;

    /// Look a transaction up by id
    fn get(&self, id: &TransactionId) -> Result<Option<Transaction>>;

    /// One page of transactions matching `filter`, plus the total match count
    ///
    /// Ordered by day descending, business ascending, amount descending.
    fn list(&self, filter: &TransactionFilter, page: PageDescriptor)
        -> Result<(Vec<Transaction>, u64)>;

    /// Number of transactions matching `filter`
    fn count(&self, filter: &TransactionFilter) -> Result<u64>;

    /// Earliest and latest stored transaction timestamps
    fn date_bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)>;
}

impl<T: TransactionStore + ?Sized> TransactionStore for Arc<T> {
    fn create(&self, candidate: &CandidateTransaction, id: &TransactionId)
        -> Result<CreateOutcome> {
        (**self).create(candidate, id)
    }

    fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        (**self).get(id)
    }

    fn list(&self, filter: &TransactionFilter, page: PageDescriptor)
        -> Result<(Vec<Transaction>, u64)> {
        (**self).list(filter, page)
    }

    fn count(&self, filter: &TransactionFilter) -> Result<u64> {
        (**self).count(filter)
    }

    fn date_bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        (**self).date_bounds()
    }
}
