//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod bank;
mod message;
mod outcome;
mod pagination;
mod transaction;
pub mod result;

pub use bank::Bank;
pub use message::RawMessage;
pub use outcome::{IngestionOutcome, IngestionStatus, SourceReport, SourceStatus};
pub use pagination::{
    Cursor, DateRange, Page, PageDescriptor, PageMeta, PaginationDetails, TransactionFilter,
    MAX_PAGES,
};
pub use transaction::{
    CandidateTransaction, ExpenseCategory, ExpensePriority, Transaction, TransactionId,
};
