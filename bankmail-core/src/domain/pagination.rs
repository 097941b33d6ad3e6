//! Pagination, date windows and cursors

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Identifies one page of a source's result set (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageDescriptor {
    page: u32,
    page_size: u32,
}

impl PageDescriptor {
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page == 0 {
            return Err(Error::validation("page must be >= 1"));
        }
        if page_size == 0 {
            return Err(Error::validation("page_size must be >= 1"));
        }
        Ok(Self { page, page_size })
    }

    pub fn first(page_size: u32) -> Result<Self> {
        Self::new(1, page_size)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }
}

/// Upper bound on the pages one source may report for a single run
pub const MAX_PAGES: u32 = 10_000;

/// Result-set metadata reported alongside the first page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationDetails {
    pub total_items: u64,
    pub page_size: u32,
}

impl PaginationDetails {
    pub fn new(total_items: u64, page_size: u32) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::validation("page_size must be >= 1"));
        }
        let details = Self {
            total_items,
            page_size,
        };
        if details.total_pages() > MAX_PAGES {
            return Err(Error::validation(format!(
                "{} items at page size {} exceeds the {}-page limit",
                total_items, page_size, MAX_PAGES
            )));
        }
        Ok(details)
    }

    /// `ceil(total_items / page_size)`; zero items means zero pages
    ///
    /// Saturates at `u32::MAX` instead of wrapping.
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        u32::try_from(self.total_items.div_ceil(self.page_size as u64)).unwrap_or(u32::MAX)
    }
}

/// Inclusive time window, either bound optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::validation(format!(
                    "start date {} is after end date {}",
                    s, e
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

fn format_bound(bound: Option<DateTime<Utc>>) -> String {
    match bound {
        Some(ts) => ts.format("%B %d, %Y at %I:%M %p").to_string(),
        None => "N/A".to_string(),
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", format_bound(self.start), format_bound(self.end))
    }
}

/// Opaque position in a listing: URL-safe base64 of `{"page":N,"page_size":M}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub page: u32,
    pub page_size: u32,
}

impl Cursor {
    pub fn encode(&self) -> String {
        // Serializing two integers cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        URL_SAFE.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE
            .decode(token.trim())
            .map_err(|_| Error::validation("Invalid cursor"))?;
        let cursor: Cursor =
            serde_json::from_slice(&bytes).map_err(|_| Error::validation("Invalid cursor"))?;
        // Reject zeros through the descriptor rules
        PageDescriptor::new(cursor.page, cursor.page_size)?;
        Ok(cursor)
    }

    pub fn descriptor(&self) -> Result<PageDescriptor> {
        PageDescriptor::new(self.page, self.page_size)
    }
}

impl From<PageDescriptor> for Cursor {
    fn from(page: PageDescriptor) -> Self {
        Self {
            page: page.page(),
            page_size: page.page_size(),
        }
    }
}

/// Filter applied to stored transaction queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub date_range: DateRange,
    pub bank_email: Option<String>,
}

/// Listing metadata returned with a page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total_items: u64,
    pub total_pages: u32,
    pub page_size: u32,
    pub page: u32,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

impl PageMeta {
    pub fn new(page: PageDescriptor, total_items: u64) -> Self {
        let total_pages = PaginationDetails {
            total_items,
            page_size: page.page_size(),
        }
        .total_pages();

        let next_cursor = (page.page() < total_pages).then(|| {
            Cursor {
                page: page.page() + 1,
                page_size: page.page_size(),
            }
            .encode()
        });
        let prev_cursor = (page.page() > 1).then(|| {
            Cursor {
                page: page.page() - 1,
                page_size: page.page_size(),
            }
            .encode()
        });

        Self {
            total_items,
            total_pages,
            page_size: page.page_size(),
            page: page.page(),
            next_cursor,
            prev_cursor,
        }
    }
}

/// A page of items plus its listing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageMeta,
}
