//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod message_parser;
mod page_fetcher;
mod transaction_store;

pub use message_parser::{MessageParser, ParseOutcome};
pub use page_fetcher::{FetchResponse, MessagePage, PageFetcher, SourceQuery};
pub use transaction_store::{CreateOutcome, TransactionStore};
