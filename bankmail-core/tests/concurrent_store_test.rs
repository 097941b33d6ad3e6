//! Concurrent store access tests
//!
//! Several threads racing to store the same transactions must produce
//! exactly one `Created` per identity, whichever store backs them.
//!
//! Run with: cargo test --test concurrent_store_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use bankmail_core::adapters::duckdb::DuckDbTransactionStore;
use bankmail_core::adapters::memory::InMemoryTransactionStore;
use bankmail_core::domain::{CandidateTransaction, TransactionFilter};
use bankmail_core::ports::{CreateOutcome, TransactionStore};

/// Number of concurrent threads
const THREAD_COUNT: usize = 6;

/// Distinct transactions each thread tries to store
const TRANSACTIONS: u32 = 20;

fn candidate(i: u32) -> CandidateTransaction {
    CandidateTransaction {
        bank_name: "BAC".to_string(),
        bank_email: "notificacion@notificacionesbaccr.com".to_string(),
        business: format!("COMERCIO {}", i),
        business_type: None,
        currency_code: "CRC".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 10, 1, 8, 0, 0).unwrap()
            + chrono::Duration::minutes(i as i64),
        amount: Decimal::new(150_000 + i as i64, 2),
        raw_body: format!("Comercio: COMERCIO {}", i),
        priority: None,
        category: None,
    }
}

/// Every thread stores the same set; returns (created, already existing)
fn race(store: Arc<dyn TransactionStore>) -> (usize, usize) {
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let created = Arc::new(AtomicUsize::new(0));
    let existing = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let created = Arc::clone(&created);
            let existing = Arc::clone(&existing);

            thread::spawn(move || {
                barrier.wait();
                for i in 0..TRANSACTIONS {
                    let c = candidate(i);
                    match store.create(&c, &c.identity()) {
                        Ok(CreateOutcome::Created(_)) => {
                            created.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(CreateOutcome::AlreadyExists(_)) => {
                            existing.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => panic!("store error: {}", e),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    (created.load(Ordering::SeqCst), existing.load(Ordering::SeqCst))
}

#[test]
fn test_duckdb_single_created_per_identity() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        DuckDbTransactionStore::open(&temp_dir.path().join("test_concurrent.duckdb")).unwrap(),
    );

    let (created, existing) = race(store.clone());

    assert_eq!(created, TRANSACTIONS as usize);
    assert_eq!(existing, (THREAD_COUNT - 1) * TRANSACTIONS as usize);
    assert_eq!(
        store.count(&TransactionFilter::default()).unwrap(),
        TRANSACTIONS as u64
    );
}

#[test]
fn test_memory_single_created_per_identity() {
    let store = Arc::new(InMemoryTransactionStore::new());

    let (created, existing) = race(store.clone());

    assert_eq!(created, TRANSACTIONS as usize);
    assert_eq!(existing, (THREAD_COUNT - 1) * TRANSACTIONS as usize);
    assert_eq!(store.len(), TRANSACTIONS as usize);
}

#[test]
fn test_stored_values_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("reopen.duckdb");
    let c = candidate(7);

    {
        let store = DuckDbTransactionStore::open(&db_path).unwrap();
        assert!(store.create(&c, &c.identity()).unwrap().is_created());
    }

    let store = DuckDbTransactionStore::open(&db_path).unwrap();
    let tx = store.get(&c.identity()).unwrap().unwrap();
    assert_eq!(tx.amount.normalize(), c.amount.normalize());
    assert_eq!(tx.timestamp, c.timestamp);
    assert_eq!(tx.business, c.business);
    assert!(matches!(
        store.create(&c, &c.identity()).unwrap(),
        CreateOutcome::AlreadyExists(_)
    ));
}
