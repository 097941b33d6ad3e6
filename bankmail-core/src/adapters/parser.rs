//! Label-driven notification parser
//!
//! Bank notifications are mostly `Label: value` pairs wrapped in HTML.
//! A [`ParserProfile`] names the labels a bank uses; the parser strips the
//! markup, reads the pairs and builds a candidate transaction.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::{Bank, CandidateTransaction, RawMessage};
use crate::ports::{MessageParser, ParseOutcome};

/// Built-in parser profiles, selectable from settings.json
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    Bac,
    Promerica,
}

impl ParserKind {
    pub fn profile(&self) -> ParserProfile {
        match self {
            ParserKind::Bac => ParserProfile::bac(),
            ParserKind::Promerica => ParserProfile::promerica(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParserKind::Bac => "bac",
            ParserKind::Promerica => "promerica",
        }
    }
}

/// Labels and defaults for one bank's notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserProfile {
    pub bank_name: String,
    pub bank_email: String,
    pub amount_labels: Vec<String>,
    pub merchant_labels: Vec<String>,
    pub merchant_type_labels: Vec<String>,
    /// Messages whose subject contains any of these are skipped
    pub skip_subjects: Vec<String>,
    pub default_currency: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ParserProfile {
    pub fn bac() -> Self {
        Self {
            bank_name: Bank::Bac.name().to_string(),
            bank_email: Bank::Bac.email().to_string(),
            amount_labels: strings(&["Monto", "Amount"]),
            merchant_labels: strings(&["Comercio", "Merchant"]),
            merchant_type_labels: strings(&["Tipo de comercio", "Tipo"]),
            skip_subjects: strings(&["Estado de cuenta", "Promoción"]),
            default_currency: "CRC".to_string(),
        }
    }

    pub fn promerica() -> Self {
        Self {
            bank_name: Bank::Promerica.name().to_string(),
            bank_email: Bank::Promerica.email().to_string(),
            amount_labels: strings(&["Monto", "Monto de la transacción"]),
            merchant_labels: strings(&["Comercio", "Establecimiento"]),
            merchant_type_labels: strings(&["Tipo de comercio"]),
            skip_subjects: strings(&["Estado de cuenta"]),
            default_currency: "CRC".to_string(),
        }
    }
}

/// [`MessageParser`] driven by a [`ParserProfile`]
#[derive(Debug)]
pub struct LabeledMessageParser {
    profile: ParserProfile,
    tag_re: Regex,
    block_re: Regex,
    amount_re: Regex,
    number_re: Regex,
}

impl LabeledMessageParser {
    pub fn new(profile: ParserProfile) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Config(format!("Invalid pattern: {}", e)))
        };

        Ok(Self {
            profile,
            tag_re: compile(r"<[^>]*>")?,
            block_re: compile(r"(?i)<\s*(br|/p|/div|/tr|/li|/h[1-6])\s*/?\s*>")?,
            amount_re: compile(r"(?i)(CRC|USD|₡|\$)\s*([0-9][0-9,]*(?:\.[0-9]+)?)")?,
            number_re: compile(r"([0-9][0-9,]*(?:\.[0-9]+)?)")?,
        })
    }

    pub fn profile(&self) -> &ParserProfile {
        &self.profile
    }

    /// Body as plain-text lines
    fn text_lines(&self, body: &str) -> Vec<String> {
        let with_breaks = self.block_re.replace_all(body, "\n");
        let text = self.tag_re.replace_all(&with_breaks, " ");
        let text = text
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&#8353;", "₡");

        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Value of the first line labelled with any of `labels`
    ///
    /// A label with nothing after the colon takes the following line.
    fn field(&self, lines: &[String], labels: &[String]) -> Option<String> {
        for (i, line) in lines.iter().enumerate() {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let label = label.trim();
            if !labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
                continue;
            }
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
            if let Some(next) = lines.get(i + 1) {
                return Some(next.trim().to_string());
            }
        }
        None
    }

    /// Amount and ISO currency code from text like `CRC 12,500.00` or `$10.00`
    fn parse_amount(&self, text: &str) -> Result<(Decimal, String)> {
        let (currency, digits) = match self.amount_re.captures(text) {
            Some(caps) => {
                let currency = match &caps[1] {
                    "₡" => "CRC".to_string(),
                    "$" => "USD".to_string(),
                    code => code.to_ascii_uppercase(),
                };
                (currency, caps[2].to_string())
            }
            None => {
                let caps = self
                    .number_re
                    .captures(text)
                    .ok_or_else(|| Error::parse(format!("No amount in '{}'", text)))?;
                (self.profile.default_currency.clone(), caps[1].to_string())
            }
        };

        let amount = digits
            .replace(',', "")
            .parse::<Decimal>()
            .map_err(|e| Error::parse(format!("Invalid amount '{}': {}", digits, e)))?;
        Ok((amount, currency))
    }
}

impl MessageParser for LabeledMessageParser {
    fn parse(&self, message: &RawMessage) -> Result<ParseOutcome> {
        let subject = message.subject.as_deref().unwrap_or_default();
        if let Some(skip) = self
            .profile
            .skip_subjects
            .iter()
            .find(|s| subject.to_lowercase().contains(&s.to_lowercase()))
        {
            return Ok(ParseOutcome::Skip(format!("subject matches '{}'", skip)));
        }

        let body = match message.body.as_deref() {
            Some(body) if !body.trim().is_empty() => body,
            _ => return Err(Error::parse("Message has no body")),
        };
        let timestamp = message
            .timestamp
            .ok_or_else(|| Error::parse("Message has no date"))?;

        let lines = self.text_lines(body);
        let amount_text = self.field(&lines, &self.profile.amount_labels);
        let merchant = self.field(&lines, &self.profile.merchant_labels);

        let (amount_text, business) = match (amount_text, merchant) {
            (None, None) => {
                return Ok(ParseOutcome::Skip(
                    "no transaction fields in body".to_string(),
                ))
            }
            (Some(_), None) => return Err(Error::parse("Missing merchant")),
            (None, Some(_)) => return Err(Error::parse("Missing amount")),
            (Some(amount), Some(merchant)) => (amount, merchant),
        };

        let (amount, currency_code) = self.parse_amount(&amount_text)?;

        Ok(ParseOutcome::Candidate(CandidateTransaction {
            bank_name: self.profile.bank_name.clone(),
            bank_email: self.profile.bank_email.clone(),
            business,
            business_type: self.field(&lines, &self.profile.merchant_type_labels),
            currency_code,
            timestamp,
            amount,
            raw_body: body.to_string(),
            priority: None,
            category: None,
        }))
    }
}
