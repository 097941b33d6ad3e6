//! Page fetcher port
//!
//! Defines the interface for retrieving one page of raw messages from an
//! upstream source (the email reader service, a fixture, etc.)

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::{DateRange, PageDescriptor, PaginationDetails, RawMessage};

/// Source-specific filter sent with every page request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    /// Sender addresses to match
    pub senders: Vec<String>,
    /// Optional subject filter
    pub subject: Option<String>,
}

impl SourceQuery {
    pub fn new(senders: Vec<String>, subject: Option<String>) -> Self {
        Self { senders, subject }
    }
}

/// One page of messages plus the result-set metadata
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePage {
    pub items: Vec<RawMessage>,
    pub pagination: PaginationDetails,
    pub message: Option<String>,
}

/// Non-error answers a fetcher can give
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    Page(MessagePage),
    /// The source definitively has nothing for this query
    NoContent { message: String },
}

/// Page fetcher trait
///
/// Implementations must be callable from several worker threads at once.
/// Transport failures and non-success statuses are returned as `Err`.
pub trait PageFetcher: Send + Sync {
    fn fetch_page(
        &self,
        source: &SourceQuery,
        range: &DateRange,
        page: PageDescriptor,
    ) -> Result<FetchResponse>;
}
