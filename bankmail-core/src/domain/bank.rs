//! Known banks and their notification senders

use serde::{Deserialize, Serialize};

/// A bank that sends transaction notification emails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    Bac,
    Promerica,
    Siman,
}

impl Bank {
    pub const ALL: [Bank; 3] = [Bank::Bac, Bank::Promerica, Bank::Siman];

    /// Display name of the bank
    pub fn name(&self) -> &'static str {
        match self {
            Bank::Bac => "BAC",
            Bank::Promerica => "Promerica",
            Bank::Siman => "Siman",
        }
    }

    /// Sender address used by the bank's notifications (empty if unknown)
    pub fn email(&self) -> &'static str {
        match self {
            Bank::Bac => "notificacion@notificacionesbaccr.com",
            Bank::Promerica => "info@promerica.fi.cr",
            Bank::Siman => "",
        }
    }

    /// Look a bank up by display name or sender address, case-insensitively
    pub fn from_email_or_name(identifier: &str) -> Option<Bank> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|bank| {
            bank.name().eq_ignore_ascii_case(identifier)
                || bank.email().eq_ignore_ascii_case(identifier)
        })
    }
}

impl std::fmt::Display for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_email() {
        assert_eq!(Bank::from_email_or_name("bac"), Some(Bank::Bac));
        assert_eq!(
            Bank::from_email_or_name("INFO@promerica.fi.cr"),
            Some(Bank::Promerica)
        );
        assert_eq!(Bank::from_email_or_name("unknown"), None);
    }

    #[test]
    fn test_empty_identifier_matches_nothing() {
        // Siman has no sender address; an empty lookup must not resolve to it
        assert_eq!(Bank::from_email_or_name(""), None);
    }
}
