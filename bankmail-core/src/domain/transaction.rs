//! Transaction domain model

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::result::{Error, Result};

/// Content-addressed transaction identifier
///
/// Hex-encoded SHA-256 over the bank sender, amount and timestamp.
/// Used as the idempotency key when persisting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Derive the identity of a transaction
    ///
    /// Inputs are hashed exactly as given; callers are responsible for
    /// putting the amount and timestamp in canonical form first.
    pub fn derive(bank_email: &str, amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        let input = format!(
            "{}|{}|{}",
            bank_email,
            amount,
            timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        );
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an existing identifier (e.g. read back from storage or user input)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::validation(format!("Invalid transaction id: {}", s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How necessary an expense was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpensePriority {
    Must,
    Want,
    Need,
}

impl ExpensePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpensePriority::Must => "MUST",
            ExpensePriority::Want => "WANT",
            ExpensePriority::Need => "NEED",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MUST" => Some(ExpensePriority::Must),
            "WANT" => Some(ExpensePriority::Want),
            "NEED" => Some(ExpensePriority::Need),
            _ => None,
        }
    }
}

/// Spending category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseCategory {
    Taxes,
    Groceries,
    EatingOut,
    Entertainment,
    Transport,
    SelfCare,
    Pet,
    Gift,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Taxes => "TAXES",
            ExpenseCategory::Groceries => "GROCERIES",
            ExpenseCategory::EatingOut => "EATING_OUT",
            ExpenseCategory::Entertainment => "ENTERTAINMENT",
            ExpenseCategory::Transport => "TRANSPORT",
            ExpenseCategory::SelfCare => "SELF_CARE",
            ExpenseCategory::Pet => "PET",
            ExpenseCategory::Gift => "GIFT",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TAXES" => Some(ExpenseCategory::Taxes),
            "GROCERIES" => Some(ExpenseCategory::Groceries),
            "EATING_OUT" => Some(ExpenseCategory::EatingOut),
            "ENTERTAINMENT" => Some(ExpenseCategory::Entertainment),
            "TRANSPORT" => Some(ExpenseCategory::Transport),
            "SELF_CARE" => Some(ExpenseCategory::SelfCare),
            "PET" => Some(ExpenseCategory::Pet),
            "GIFT" => Some(ExpenseCategory::Gift),
            _ => None,
        }
    }
}

/// A transaction extracted from a message, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    pub bank_name: String,
    pub bank_email: String,
    pub business: String,
    pub business_type: Option<String>,
    pub currency_code: String,
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub raw_body: String,
    pub priority: Option<ExpensePriority>,
    pub category: Option<ExpenseCategory>,
}

impl CandidateTransaction {
    /// Identity of this candidate
    ///
    /// The amount is normalized first so `12.50` and `12.5` hash the same.
    pub fn identity(&self) -> TransactionId {
        TransactionId::derive(&self.bank_email, self.amount.normalize(), self.timestamp)
    }
}

/// A persisted transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub bank_name: String,
    pub bank_email: String,
    pub business: String,
    pub business_type: Option<String>,
    pub currency_code: String,
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub raw_body: String,
    pub priority: Option<ExpensePriority>,
    pub category: Option<ExpenseCategory>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build the stored form of a candidate
    pub fn from_candidate(id: TransactionId, candidate: &CandidateTransaction) -> Self {
        Self {
            id,
            bank_name: candidate.bank_name.clone(),
            bank_email: candidate.bank_email.clone(),
            business: candidate.business.clone(),
            business_type: candidate.business_type.clone(),
            currency_code: candidate.currency_code.clone(),
            timestamp: candidate.timestamp,
            amount: candidate.amount,
            raw_body: candidate.raw_body.clone(),
            priority: candidate.priority,
            category: candidate.category,
            created_at: Utc::now(),
        }
    }
}
