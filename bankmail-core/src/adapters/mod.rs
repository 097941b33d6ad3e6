//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB and in-memory stores for the TransactionStore port
//! - Email reader HTTP client for the PageFetcher port
//! - Label-driven parser for the MessageParser port

pub mod duckdb;
pub mod email_reader;
pub mod memory;
pub mod parser;
pub mod preview;
