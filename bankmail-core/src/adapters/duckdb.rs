//! DuckDB transaction store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, params_from_iter, Connection};
use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::{
    CandidateTransaction, ExpenseCategory, ExpensePriority, PageDescriptor, Transaction,
    TransactionFilter, TransactionId,
};
use crate::ports::{CreateOutcome, TransactionStore};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Decimal places of the `amount` column
const AMOUNT_SCALE: u32 = 4;

/// Timestamps are stored as naive UTC
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const SELECT_COLUMNS: &str = "transaction_id, bank_name, bank_email, business, business_type,
        currency_code, transaction_ts::VARCHAR, amount::VARCHAR, raw_body,
        expense_priority, expense_category, created_at::VARCHAR";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

/// Transaction store backed by a DuckDB file
pub struct DuckDbTransactionStore {
    conn: Mutex<Connection>,
}

impl DuckDbTransactionStore {
    /// Open (or create) the database at `db_path` and apply pending migrations
    ///
    /// Opening is retried with exponential backoff while another process
    /// holds the file lock.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    let store = Self {
                        conn: Mutex::new(conn),
                    };
                    store.run_migrations()?;
                    return Ok(store);
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            path = %db_path.display(),
                            "Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Open a throwaway in-memory database with the schema applied
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading stays off; nothing here needs one
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Apply pending schema migrations
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::database("Database connection lock poisoned"))
    }
}

/// WHERE clause and its string parameters for a filter
fn filter_clause(filter: &TransactionFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(start) = filter.date_range.start {
        clauses.push("transaction_ts >= CAST(? AS TIMESTAMP)");
        params.push(format_timestamp(start));
    }
    if let Some(end) = filter.date_range.end {
        clauses.push("transaction_ts <= CAST(? AS TIMESTAMP)");
        params.push(format_timestamp(end));
    }
    if let Some(email) = &filter.bank_email {
        clauses.push("lower(bank_email) = lower(?)");
        params.push(email.clone());
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), params)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::database(format!("Invalid stored timestamp '{}': {}", s, e)))
}

/// Raw column values of one `sys_transactions` row
struct StoredRow {
    id: String,
    bank_name: String,
    bank_email: String,
    business: String,
    business_type: Option<String>,
    currency_code: String,
    timestamp: String,
    amount: String,
    raw_body: String,
    priority: Option<String>,
    category: Option<String>,
    created_at: String,
}

impl StoredRow {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            bank_name: row.get(1)?,
            bank_email: row.get(2)?,
            business: row.get(3)?,
            business_type: row.get(4)?,
            currency_code: row.get(5)?,
            timestamp: row.get(6)?,
            amount: row.get(7)?,
            raw_body: row.get(8)?,
            priority: row.get(9)?,
            category: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        let amount = self
            .amount
            .parse::<Decimal>()
            .map_err(|e| Error::database(format!("Invalid stored amount '{}': {}", self.amount, e)))?
            .normalize();

        Ok(Transaction {
            id: TransactionId::parse(&self.id)?,
            bank_name: self.bank_name,
            bank_email: self.bank_email,
            business: self.business,
            business_type: self.business_type,
            currency_code: self.currency_code,
            timestamp: parse_timestamp(&self.timestamp)?,
            amount,
            raw_body: self.raw_body,
            priority: self.priority.as_deref().and_then(ExpensePriority::from_str_opt),
            category: self.category.as_deref().and_then(ExpenseCategory::from_str_opt),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl TransactionStore for DuckDbTransactionStore {
    fn create(
        &self,
        candidate: &CandidateTransaction,
        id: &TransactionId,
    ) -> Result<CreateOutcome> {
        // The amount column keeps four decimal places
        if candidate.amount.normalize().scale() > AMOUNT_SCALE {
            return Err(Error::validation(format!(
                "amount {} has more than {} decimal places",
                candidate.amount, AMOUNT_SCALE
            )));
        }

        let tx = Transaction::from_candidate(id.clone(), candidate);
        let conn = self.conn()?;

        // The primary key arbitrates concurrent inserts of the same identity
        let rows_changed = conn.execute(
            "INSERT INTO sys_transactions (transaction_id, bank_name, bank_email, business,
                                           business_type, currency_code, transaction_ts, amount,
                                           raw_body, expense_priority, expense_category, created_at)
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS DECIMAL(18, 4)),
                     ?, ?, ?, CAST(? AS TIMESTAMP))
             ON CONFLICT (transaction_id) DO NOTHING",
            params![
                tx.id.as_str(),
                tx.bank_name,
                tx.bank_email,
                tx.business,
                tx.business_type,
                tx.currency_code,
                format_timestamp(tx.timestamp),
                tx.amount.to_string(),
                tx.raw_body,
                tx.priority.map(|p| p.as_str()),
                tx.category.map(|c| c.as_str()),
                format_timestamp(tx.created_at),
            ],
        )?;

        if rows_changed > 0 {
            Ok(CreateOutcome::Created(tx))
        } else {
            Ok(CreateOutcome::AlreadyExists(id.clone()))
        }
    }

    fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_transactions WHERE transaction_id = ?",
            SELECT_COLUMNS
        ))?;

        let row = stmt
            .query_map([id.as_str()], StoredRow::from_row)?
            .next()
            .transpose()?;
        row.map(StoredRow::into_transaction).transpose()
    }

    fn list(
        &self,
        filter: &TransactionFilter,
        page: PageDescriptor,
    ) -> Result<(Vec<Transaction>, u64)> {
        let total = self.count(filter)?;
        let (where_clause, params) = filter_clause(filter);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_transactions {}
             ORDER BY CAST(transaction_ts AS DATE) DESC, business ASC, amount DESC, transaction_id ASC
             LIMIT {} OFFSET {}",
            SELECT_COLUMNS,
            where_clause,
            page.page_size(),
            page.offset()
        ))?;

        let rows = stmt
            .query_map(params_from_iter(params.iter()), StoredRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let items = rows
            .into_iter()
            .map(StoredRow::into_transaction)
            .collect::<Result<Vec<_>>>()?;

        Ok((items, total))
    }

    fn count(&self, filter: &TransactionFilter) -> Result<u64> {
        let (where_clause, params) = filter_clause(filter);
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM sys_transactions {}", where_clause),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn date_bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let conn = self.conn()?;
        let (earliest, latest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(transaction_ts)::VARCHAR, MAX(transaction_ts)::VARCHAR FROM sys_transactions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok((
            earliest.as_deref().map(parse_timestamp).transpose()?,
            latest.as_deref().map(parse_timestamp).transpose()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DateRange;
    use chrono::TimeZone;

    fn candidate(email: &str, business: &str, amount: i64, day: u32) -> CandidateTransaction {
        CandidateTransaction {
            bank_name: "BAC".to_string(),
            bank_email: email.to_string(),
            business: business.to_string(),
            business_type: Some("RESTAURANTES".to_string()),
            currency_code: "CRC".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, day, 18, 45, 30).unwrap(),
            amount: Decimal::new(amount, 2),
            raw_body: "<p>body</p>".to_string(),
            priority: Some(ExpensePriority::Want),
            category: Some(ExpenseCategory::EatingOut),
        }
    }

    const BAC: &str = "notificacion@notificacionesbaccr.com";
    const PROMERICA: &str = "info@promerica.fi.cr";

    #[test]
    fn test_create_then_duplicate() {
        let store = DuckDbTransactionStore::open_in_memory().unwrap();
        let c = candidate(BAC, "SODA", 350000, 3);
        let id = c.identity();

        let created = store.create(&c, &id).unwrap();
        assert!(created.is_created());
        assert_eq!(
            store.create(&c, &id).unwrap(),
            CreateOutcome::AlreadyExists(id.clone())
        );
        assert_eq!(store.count(&TransactionFilter::default()).unwrap(), 1);
    }

    #[test]
    fn test_amount_scale_is_enforced() {
        let store = DuckDbTransactionStore::open_in_memory().unwrap();

        let mut fine = candidate(BAC, "CAMBIO", 0, 4);
        fine.amount = Decimal::new(123_456_789, 6);
        let fine_id = fine.identity();
        assert!(store.create(&fine, &fine_id).is_err());
        assert!(store.get(&fine_id).unwrap().is_none());

        // Trailing zeros beyond the column scale are not rounding
        let mut padded = candidate(BAC, "CAMBIO", 0, 4);
        padded.amount = Decimal::new(1_250_000, 5);
        let padded_id = padded.identity();
        assert!(store.create(&padded, &padded_id).unwrap().is_created());

        let mut exact = candidate(BAC, "CAMBIO", 0, 5);
        exact.amount = Decimal::new(1_234_567, 4);
        let exact_id = exact.identity();
        assert!(store.create(&exact, &exact_id).unwrap().is_created());
        let stored = store.get(&exact_id).unwrap().unwrap();
        assert_eq!(stored.amount.normalize(), exact.amount.normalize());
    }

    #[test]
    fn test_get_round_trips_fields() {
        let store = DuckDbTransactionStore::open_in_memory().unwrap();
        let c = candidate(BAC, "SODA", 1234567, 3);
        let id = c.identity();
        store.create(&c, &id).unwrap();

        let tx = store.get(&id).unwrap().unwrap();
        assert_eq!(tx.id, id);
        assert_eq!(tx.amount, Decimal::new(1234567, 2));
        assert_eq!(tx.timestamp, c.timestamp);
        assert_eq!(tx.business_type.as_deref(), Some("RESTAURANTES"));
        assert_eq!(tx.priority, Some(ExpensePriority::Want));
        assert_eq!(tx.category, Some(ExpenseCategory::EatingOut));

        let missing = TransactionId::derive("x", Decimal::ONE, c.timestamp);
        assert!(store.get(&missing).unwrap().is_none());
    }

    #[test]
    fn test_list_ordering_and_filters() {
        let store = DuckDbTransactionStore::open_in_memory().unwrap();
        for c in [
            candidate(BAC, "B-SHOP", 500, 1),
            candidate(BAC, "A-SHOP", 100, 1),
            candidate(BAC, "A-SHOP", 900, 1),
            candidate(PROMERICA, "Z-SHOP", 100, 2),
        ] {
            store.create(&c, &c.identity()).unwrap();
        }

        let (items, total) = store
            .list(&TransactionFilter::default(), PageDescriptor::new(1, 10).unwrap())
            .unwrap();
        assert_eq!(total, 4);
        let names: Vec<(&str, Decimal)> =
            items.iter().map(|t| (t.business.as_str(), t.amount)).collect();
        assert_eq!(
            names,
            vec![
                ("Z-SHOP", Decimal::new(100, 2)),
                ("A-SHOP", Decimal::new(900, 2)),
                ("A-SHOP", Decimal::new(100, 2)),
                ("B-SHOP", Decimal::new(500, 2)),
            ]
        );

        let by_bank = TransactionFilter {
            bank_email: Some(PROMERICA.to_uppercase()),
            ..Default::default()
        };
        assert_eq!(store.count(&by_bank).unwrap(), 1);

        let day_one = TransactionFilter {
            date_range: DateRange::new(
                Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
                Some(Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap()),
            )
            .unwrap(),
            bank_email: None,
        };
        let (page_two, total) = store
            .list(&day_one, PageDescriptor::new(2, 2).unwrap())
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].business, "B-SHOP");
    }

    #[test]
    fn test_date_bounds() {
        let store = DuckDbTransactionStore::open_in_memory().unwrap();
        assert_eq!(store.date_bounds().unwrap(), (None, None));

        let early = candidate(BAC, "A", 100, 1);
        let late = candidate(BAC, "B", 100, 9);
        store.create(&early, &early.identity()).unwrap();
        store.create(&late, &late.identity()).unwrap();

        let (min, max) = store.date_bounds().unwrap();
        assert_eq!(min, Some(early.timestamp));
        assert_eq!(max, Some(late.timestamp));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bankmail.duckdb");
        let c = candidate(BAC, "SODA", 100, 3);

        {
            let store = DuckDbTransactionStore::open(&path).unwrap();
            store.create(&c, &c.identity()).unwrap();
        }

        let store = DuckDbTransactionStore::open(&path).unwrap();
        assert!(matches!(
            store.create(&c, &c.identity()).unwrap(),
            CreateOutcome::AlreadyExists(_)
        ));
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error("IO Error: Could not set lock on file"));
        assert!(is_retryable_error("database is locked"));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }
}
