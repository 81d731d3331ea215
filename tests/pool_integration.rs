//! Integration tests for the connection pool and transactions.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use strata::connection::ConnectionString;
use strata::pool::{SingleConnectionPool, ThreadedPool};
use strata::prelude::*;
use strata::transaction::TransactionalConnection;
use strata::ErrorCode;

/// A connection that records the control statements it receives.
struct LoggedConnection {
    log: Arc<Mutex<Vec<String>>>,
}

impl TransactionalConnection for LoggedConnection {
    fn execute_control(&self, sql: &str) -> QueryResult<()> {
        self.log.lock().push(sql.to_string());
        Ok(())
    }
}

#[test]
fn test_single_slot_pool_blocks_second_caller() {
    let pool = Arc::new(
        ThreadedPool::new(1, || Ok(String::from("conn")))
            .unwrap()
            .with_acquire_timeout(Duration::from_secs(5)),
    );
    let a = CallerId::new();
    let b = CallerId::new();

    pool.acquire(a).unwrap();
    let (tx, rx) = mpsc::channel();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let conn = pool.acquire(b).unwrap();
            tx.send(conn.to_string()).unwrap();
            pool.release(b);
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    pool.release(a);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "conn");
    waiter.join().unwrap();

    assert_eq!(pool.created_count(), 1);
    assert_eq!(pool.allocated(), 0);
    assert_eq!(pool.available_connections(), 1);
}

#[test]
fn test_exhausted_pool_times_out() {
    let pool = ThreadedPool::new(1, || Ok(()))
        .unwrap()
        .with_acquire_timeout(Duration::from_millis(50));
    let holder = CallerId::new();
    pool.acquire(holder).unwrap();

    let err = pool.acquire(CallerId::new()).unwrap_err();
    assert_eq!(err.code, ErrorCode::PoolTimeout);
    assert!(err.is_pool_error());

    // The holder itself reenters without waiting.
    pool.acquire(holder).unwrap();
    assert_eq!(pool.allocated(), 1);
}

#[test]
fn test_zero_timeout_reports_exhaustion() {
    let pool = ThreadedPool::new(1, || Ok(()))
        .unwrap()
        .with_acquire_timeout(Duration::ZERO);
    pool.acquire(CallerId::new()).unwrap();

    let err = pool.acquire(CallerId::new()).unwrap_err();
    assert_eq!(err.code, ErrorCode::PoolExhausted);
    assert!(err.is_retryable());
}

#[test]
fn test_url_timeout_beyond_any_deadline() {
    let url = "postgres://db/app?max_connections=1&pool_timeout=18446744073709551615";
    let options = ConnectionString::parse(url)
        .unwrap()
        .pool_options()
        .unwrap();
    let pool = Arc::new(ConnectionPool::from_options(&options, || Ok(7_u32)).unwrap());
    let holder = CallerId::new();
    assert_eq!(*pool.acquire(holder).unwrap(), 7);

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let caller = CallerId::new();
            tx.send(*pool.acquire(caller).unwrap()).unwrap();
            pool.release(caller);
        })
    };
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    pool.release(holder);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    waiter.join().unwrap();
}

#[test]
fn test_panicking_factory_does_not_leak_capacity() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory_calls = Arc::clone(&calls);
    let pool = ThreadedPool::new(1, move || {
        if factory_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("driver crashed");
        }
        Ok(String::from("conn"))
    })
    .unwrap()
    .with_acquire_timeout(Duration::from_millis(200));

    let first = CallerId::new();
    assert!(catch_unwind(AssertUnwindSafe(|| pool.acquire(first))).is_err());
    assert_eq!(pool.status().creating, 0);

    let second = CallerId::new();
    assert_eq!(*pool.acquire(second).unwrap(), "conn");
    pool.release(second);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(pool.created_count(), 1);
}

#[test]
fn test_shared_connection_survives_disconnect_while_held() {
    let closed = Arc::new(AtomicUsize::new(0));
    let closer_count = Arc::clone(&closed);
    let pool = SingleConnectionPool::new(|| Ok(String::from("memory"))).with_closer(move |_| {
        closer_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    pool.hold(CallerId::new(), |conn| {
        assert_eq!(pool.disconnect_with(|_| true, |_| {}), 0);
        assert_eq!(conn, "memory");
        Ok::<_, QueryError>(())
    })
    .unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 0);
    assert_eq!(pool.available_connections(), 1);

    assert_eq!(pool.disconnect_with(|_| true, |_| {}), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_population_never_exceeds_max() {
    let pool = Arc::new(ThreadedPool::new(3, || Ok(0_u8)).unwrap());
    let in_use = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..10)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..20 {
                    pool.hold(CallerId::new(), |_| {
                        let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        assert!(pool.status().size <= 3);
                        thread::sleep(Duration::from_micros(200));
                        in_use.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, QueryError>(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(pool.created_count() <= 3);
    assert_eq!(pool.allocated(), 0);
}

#[test]
fn test_nested_transaction_with_savepoint() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory_log = Arc::clone(&log);
    let pool = ConnectionPool::from(
        ThreadedPool::new(2, move || {
            Ok(LoggedConnection {
                log: Arc::clone(&factory_log),
            })
        })
        .unwrap(),
    );
    let tm = TransactionManager::new(Arc::new(pool), Dialect::POSTGRES);
    let caller = CallerId::new();

    let result = tm
        .transaction(caller, TransactionOptions::new(), |outer| {
            outer.execute_control("INSERT INTO t VALUES (1)")?;
            let inner = tm.transaction(caller, TransactionOptions::new().savepoint(), |conn| {
                conn.execute_control("INSERT INTO t VALUES (2)")?;
                Err::<(), _>(QueryError::rollback())
            })?;
            assert_eq!(inner, None);
            Ok(1)
        })
        .unwrap();

    assert_eq!(result, Some(1));
    assert_eq!(
        *log.lock(),
        vec![
            "BEGIN",
            "INSERT INTO t VALUES (1)",
            "SAVEPOINT autopoint_1",
            "INSERT INTO t VALUES (2)",
            "ROLLBACK TO SAVEPOINT autopoint_1",
            "COMMIT",
        ]
    );
    assert!(!tm.in_transaction(caller));
    assert_eq!(tm.pool().allocated(), 0);
}

#[test]
fn test_transaction_error_releases_connection() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory_log = Arc::clone(&log);
    let pool = ConnectionPool::from(
        ThreadedPool::new(1, move || {
            Ok(LoggedConnection {
                log: Arc::clone(&factory_log),
            })
        })
        .unwrap(),
    );
    let tm = TransactionManager::new(Arc::new(pool), Dialect::SQLITE);
    let caller = CallerId::new();

    let err = tm
        .transaction(caller, TransactionOptions::new(), |_| {
            Err::<(), _>(QueryError::database("disk full"))
        })
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::DatabaseError);
    assert_eq!(*log.lock(), vec!["BEGIN", "ROLLBACK"]);
    assert_eq!(tm.pool().available_connections(), 1);
}
