//! Raw notification message as delivered by the email reader

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single email message, source-agnostic
///
/// Field names on the wire follow the email reader service
/// (`from_email`, `date`); every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "from_email", default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "date", default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to_emails: Vec<String>,
}

impl RawMessage {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sender: Some(sender.into()),
            subject: Some(subject.into()),
            body: Some(body.into()),
            timestamp: Some(timestamp),
            to_emails: Vec::new(),
        }
    }

    /// Short description used in log lines
    pub fn describe(&self) -> String {
        format!(
            "from={} subject={:?} date={}",
            self.sender.as_deref().unwrap_or("?"),
            self.subject.as_deref().unwrap_or(""),
            self.timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "?".to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_email_reader_shape() {
        let json = r#"{
            "subject": "Notificación de transacción",
            "from_email": "notificacion@notificacionesbaccr.com",
            "to_emails": ["me@example.com"],
            "date": "2024-11-02T14:30:00Z",
            "body": "Comercio: SUPER"
        }"#;
        let msg: RawMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg.sender.as_deref(),
            Some("notificacion@notificacionesbaccr.com")
        );
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 11, 2, 14, 30, 0).unwrap())
        );
        assert_eq!(msg.to_emails, vec!["me@example.com"]);
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let msg: RawMessage = serde_json::from_str("{}").unwrap();
        assert!(msg.sender.is_none());
        assert!(msg.body.is_none());
        assert!(msg.to_emails.is_empty());
    }
}
