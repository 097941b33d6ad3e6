//! Email reader API client
//!
//! Fetches pages of mailbox messages from the email reader service:
//! `GET {base_url}/{mailbox}?start_date&end_date&senders&subject&page&page_size`.

use std::time::Duration;

use anyhow::Context;
use chrono::SecondsFormat;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::{DateRange, PageDescriptor, PaginationDetails, RawMessage};
use crate::ports::{FetchResponse, MessagePage, PageFetcher, SourceQuery};

// =============================================================================
// API Response Models
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse {
    meta: ApiMeta,
    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiMeta {
    status: u16,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    pagination: ApiPagination,
    #[serde(default)]
    items: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiPagination {
    #[serde(default)]
    total_items: u64,
    #[serde(default)]
    page_size: Option<u32>,
}

/// Map a raw HTTP answer onto the fetcher contract
///
/// 204, `meta.status == 204` and a missing `data` object mean "no content";
/// any other non-2xx status is an error.
fn interpret_response(
    status: u16,
    body: &str,
    requested_page_size: u32,
) -> Result<FetchResponse> {
    if status == 204 {
        return Ok(FetchResponse::NoContent {
            message: "No messages found".to_string(),
        });
    }
    if !(200..300).contains(&status) {
        let snippet: String = body.chars().take(200).collect();
        return Err(Error::fetch(format!(
            "Email reader returned HTTP {}: {}",
            status, snippet
        )));
    }

    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| Error::fetch(format!("Invalid email reader response: {}", e)))?;

    let message = response.meta.message;
    match response.data {
        Some(data) if response.meta.status != 204 => {
            let page_size = data
                .pagination
                .page_size
                .filter(|size| *size > 0)
                .unwrap_or(requested_page_size);
            Ok(FetchResponse::Page(MessagePage {
                items: data.items,
                pagination: PaginationDetails::new(data.pagination.total_items, page_size)?,
                message,
            }))
        }
        _ => Ok(FetchResponse::NoContent {
            message: message.unwrap_or_else(|| "No messages found".to_string()),
        }),
    }
}

/// Query string for one page request
fn build_query(
    source: &SourceQuery,
    range: &DateRange,
    page: PageDescriptor,
) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(start) = range.start {
        query.push(("start_date", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    if let Some(end) = range.end {
        query.push(("end_date", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    for sender in &source.senders {
        query.push(("senders", sender.clone()));
    }
    if let Some(subject) = &source.subject {
        query.push(("subject", subject.clone()));
    }
    query.push(("page", page.page().to_string()));
    query.push(("page_size", page.page_size().to_string()));
    query
}

// =============================================================================
// Email reader HTTP client
// =============================================================================

/// Default email reader location inside the compose network
pub const DEFAULT_EMAIL_READER_URL: &str = "http://email-reader:80";

/// Blocking client for the email reader service
#[derive(Debug)]
pub struct EmailReaderClient {
    client: Client,
    base_url: String,
    mailbox: String,
    timeout: Duration,
}

impl EmailReaderClient {
    pub fn new(base_url: &str, mailbox: &str, timeout: Duration) -> anyhow::Result<Self> {
        if base_url.trim().is_empty() {
            anyhow::bail!("Email reader URL cannot be empty");
        }
        if mailbox.trim().is_empty() {
            anyhow::bail!("Mailbox cannot be empty");
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailbox: mailbox.trim_matches('/').to_string(),
            timeout,
        })
    }

    fn mailbox_url(&self) -> String {
        format!("{}/{}", self.base_url, self.mailbox)
    }

    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::fetch(format!(
                "Email reader timed out after {} seconds",
                self.timeout.as_secs()
            ))
        } else if error.is_connect() {
            Error::fetch(format!("Unable to connect to email reader at {}", self.base_url))
        } else {
            Error::fetch(format!("Email reader request failed: {}", error))
        }
    }
}

impl PageFetcher for EmailReaderClient {
    fn fetch_page(
        &self,
        source: &SourceQuery,
        range: &DateRange,
        page: PageDescriptor,
    ) -> Result<FetchResponse> {
        let url = self.mailbox_url();
        debug!(url = %url, page = page.page(), "Requesting email page");

        let response = self
            .client
            .get(&url)
            .query(&build_query(source, range, page))
            .send()
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| self.map_request_error(e))?;
        interpret_response(status, &body, page.page_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn page(n: u32) -> PageDescriptor {
        PageDescriptor::new(n, 15).unwrap()
    }

    #[test]
    fn test_page_response() {
        let body = r#"{
            "meta": {"status": 200, "message": "ok", "request_time": 0.42},
            "data": {
                "pagination": {"total_items": 3, "total_pages": 2, "page_size": 2, "page": 1,
                               "next_cursor": null, "prev_cursor": null},
                "items": [
                    {"subject": "Compra", "from_email": "notificacion@notificacionesbaccr.com",
                     "to_emails": [], "date": "2024-11-02T14:30:00Z", "body": "Monto: 1"},
                    {"subject": "Compra", "from_email": "notificacion@notificacionesbaccr.com",
                     "to_emails": [], "date": "2024-11-02T15:30:00Z", "body": "Monto: 2"}
                ]
            }
        }"#;

        match interpret_response(200, body, 15).unwrap() {
            FetchResponse::Page(p) => {
                assert_eq!(p.items.len(), 2);
                assert_eq!(p.pagination.total_items, 3);
                assert_eq!(p.pagination.page_size, 2);
                assert_eq!(p.pagination.total_pages(), 2);
                assert_eq!(p.message.as_deref(), Some("ok"));
            }
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[test]
    fn test_no_content_variants() {
        assert!(matches!(
            interpret_response(204, "", 15).unwrap(),
            FetchResponse::NoContent { .. }
        ));

        let meta_204 = r#"{"meta": {"status": 204, "message": "No emails"}, "data": null}"#;
        match interpret_response(200, meta_204, 15).unwrap() {
            FetchResponse::NoContent { message } => assert_eq!(message, "No emails"),
            other => panic!("expected no content, got {:?}", other),
        }

        let no_data = r#"{"meta": {"status": 200}}"#;
        assert!(matches!(
            interpret_response(200, no_data, 15).unwrap(),
            FetchResponse::NoContent { .. }
        ));
    }

    #[test]
    fn test_error_statuses() {
        let err = interpret_response(500, "internal", 15).unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert!(err.to_string().contains("HTTP 500"));
        assert!(interpret_response(200, "not json", 15).is_err());
    }

    #[test]
    fn test_missing_page_size_uses_requested() {
        let body = r#"{"meta": {"status": 200},
                       "data": {"pagination": {"total_items": 30}, "items": []}}"#;
        match interpret_response(200, body, 10).unwrap() {
            FetchResponse::Page(p) => assert_eq!(p.pagination.total_pages(), 3),
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[test]
    fn test_query_parameters() {
        let source = SourceQuery::new(
            vec!["info@promerica.fi.cr".to_string()],
            Some("Comprobante de".to_string()),
        );
        let range = DateRange::new(
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            None,
        )
        .unwrap();

        let query = build_query(&source, &range, page(3));
        assert_eq!(
            query,
            vec![
                ("start_date", "2024-01-01T00:00:00Z".to_string()),
                ("senders", "info@promerica.fi.cr".to_string()),
                ("subject", "Comprobante de".to_string()),
                ("page", "3".to_string()),
                ("page_size", "15".to_string()),
            ]
        );
    }

    #[test]
    fn test_client_validation() {
        assert!(EmailReaderClient::new("", "inbox", Duration::from_secs(5)).is_err());
        assert!(
            EmailReaderClient::new(DEFAULT_EMAIL_READER_URL, " ", Duration::from_secs(5)).is_err()
        );

        let client =
            EmailReaderClient::new("http://localhost:8080/", "/inbox/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.mailbox_url(), "http://localhost:8080/inbox");
    }
}
