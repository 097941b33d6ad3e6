//! Threaded paginator - concurrent retrieval of every page of one source
//!
//! The caller fetches page 1 itself (to learn the total), hands its items
//! in as the seed, and the paginator fetches the remaining pages on scoped
//! worker threads. Each worker owns a disjoint, contiguous run of result
//! slots, so no locking is needed and page order falls out of slot order.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::domain::result::Result;
use crate::domain::{PageDescriptor, PaginationDetails, MAX_PAGES};

/// Retry behaviour for page fetches that fail with an error
///
/// A page that comes back without data is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    /// Delay before retry number `attempt` (0-based): 200ms, 400ms, 800ms, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Output of a pagination run
#[derive(Debug)]
pub struct PaginationRun<T> {
    /// Items of every page that returned data, in page order
    pub items: Vec<T>,
    pub elapsed: Duration,
    /// Pages that contributed items (the seed included)
    pub pages_fetched: u32,
    /// Pages that returned no data, failed, or were lost to a worker panic
    pub missing_pages: Vec<u32>,
}

/// Drives concurrent retrieval of all pages of a single source
///
/// `fetch` returns `Ok(Some(items))` for a page with data, `Ok(None)`
/// when the page has nothing, and `Err` on failure. Consumed by
/// [`ThreadedPaginator::run`].
pub struct ThreadedPaginator<T, F>
where
    F: Fn(PageDescriptor) -> Result<Option<Vec<T>>> + Sync,
{
    fetch: F,
    details: PaginationDetails,
    thread_count: usize,
    first_page: Option<Vec<T>>,
    retry: RetryPolicy,
    label: String,
}

impl<T, F> ThreadedPaginator<T, F>
where
    T: Send,
    F: Fn(PageDescriptor) -> Result<Option<Vec<T>>> + Sync,
{
    /// Create a paginator
    ///
    /// When `first_page` is given it becomes page 1 and fetching starts
    /// at page 2.
    pub fn new(
        fetch: F,
        details: PaginationDetails,
        thread_count: usize,
        first_page: Option<Vec<T>>,
    ) -> Self {
        Self {
            fetch,
            details,
            thread_count: thread_count.max(1),
            first_page,
            retry: RetryPolicy::none(),
            label: String::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Name used in log lines
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Fetch every remaining page and return the concatenated items
    pub fn run(self) -> PaginationRun<T> {
        let started = Instant::now();
        let reported_pages = self.details.total_pages();
        if reported_pages > MAX_PAGES {
            warn!(
                source = self.label.as_str(),
                reported_pages,
                limit = MAX_PAGES,
                "Page count over limit; fetching only the first pages"
            );
        }
        let total_pages = reported_pages.min(MAX_PAGES) as usize;

        if total_pages == 0 {
            return PaginationRun {
                items: Vec::new(),
                elapsed: started.elapsed(),
                pages_fetched: 0,
                missing_pages: Vec::new(),
            };
        }

        let mut slots: Vec<Option<Vec<T>>> = (0..total_pages).map(|_| None).collect();
        let start_page = match self.first_page {
            Some(items) => {
                slots[0] = Some(items);
                2
            }
            None => 1,
        };

        let remaining = total_pages + 1 - start_page;
        if remaining > 0 {
            let workers = self.thread_count.min(remaining);
            let base = remaining / workers;
            let extra = remaining % workers;
            let page_size = self.details.page_size;
            let fetch = &self.fetch;
            let retry = self.retry;
            let label = self.label.as_str();
            let span = tracing::Span::current();

            debug!(
                source = label,
                total_pages, start_page, workers, "Fetching remaining pages"
            );

            thread::scope(|scope| {
                let mut rest: &mut [Option<Vec<T>>] = &mut slots[start_page - 1..];
                let mut next_page = start_page;
                let mut handles = Vec::with_capacity(workers);

                for worker in 0..workers {
                    let len = base + usize::from(worker < extra);
                    let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(len);
                    rest = tail;

                    let first = next_page;
                    next_page += len;
                    let span = span.clone();

                    let handle = scope.spawn(move || {
                        let _entered = span.enter();
                        for (offset, slot) in chunk.iter_mut().enumerate() {
                            let page = (first + offset) as u32;
                            *slot = fetch_with_retry(fetch, page, page_size, &retry, label);
                        }
                    });
                    handles.push((first, first + len - 1, handle));
                }

                for (first, last, handle) in handles {
                    if handle.join().is_err() {
                        error!(
                            source = label,
                            first_page = first,
                            last_page = last,
                            "Pagination worker panicked"
                        );
                    }
                }
            });
        }

        let mut missing_pages = Vec::new();
        let mut pages_fetched = 0u32;
        let mut items = Vec::new();

        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(page_items) => {
                    pages_fetched += 1;
                    items.extend(page_items);
                }
                None => {
                    let page = index as u32 + 1;
                    error!(source = self.label.as_str(), page, "Page missing from results");
                    missing_pages.push(page);
                }
            }
        }

        PaginationRun {
            items,
            elapsed: started.elapsed(),
            pages_fetched,
            missing_pages,
        }
    }
}

fn fetch_with_retry<T, F>(
    fetch: &F,
    page: u32,
    page_size: u32,
    retry: &RetryPolicy,
    label: &str,
) -> Option<Vec<T>>
where
    F: Fn(PageDescriptor) -> Result<Option<Vec<T>>>,
{
    let descriptor = match PageDescriptor::new(page, page_size) {
        Ok(d) => d,
        Err(e) => {
            error!(source = label, page, error = %e, "Invalid page descriptor");
            return None;
        }
    };

    let mut attempt = 0;
    loop {
        match fetch(descriptor) {
            Ok(Some(items)) => {
                debug!(source = label, page, items = items.len(), "Fetched page");
                return Some(items);
            }
            Ok(None) => {
                error!(source = label, page, "No data returned for page");
                return None;
            }
            Err(e) if attempt < retry.max_retries => {
                let delay = retry.delay_for(attempt);
                warn!(
                    source = label,
                    page,
                    error = %e,
                    "Page fetch failed, retrying in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    retry.max_retries
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                error!(source = label, page, error = %e, "Failed to fetch page");
                return None;
            }
        }
    }
}
