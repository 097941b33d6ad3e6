//! Message parser port - raw message to candidate transaction

use crate::domain::result::Result;
use crate::domain::{CandidateTransaction, RawMessage};

/// What a parser made of a message
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Candidate(CandidateTransaction),
    /// Not a transaction notification; not an error
    Skip(String),
}

/// Per-source transform
///
/// Must be pure: no I/O, same input gives the same output. Malformed
/// notifications are reported as `Err(Error::Parse)`.
pub trait MessageParser: Send + Sync {
    fn parse(&self, message: &RawMessage) -> Result<ParseOutcome>;
}
