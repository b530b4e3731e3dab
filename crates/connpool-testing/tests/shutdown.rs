//! Shutdown tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use connpool::{Pool, PoolError, ShutdownReport};
use connpool_testing::{StubDriver, init_tracing};

fn pool_with_grace(size: u32, grace: Option<Duration>) -> (Pool<StubDriver>, StubDriver) {
    init_tracing();
    let driver = StubDriver::new();
    let pool = Pool::builder(driver.clone())
        .max_connections(size)
        .shutdown_timeout(grace)
        .build()
        .unwrap();
    (pool, driver)
}

fn wait_for_waiters(pool: &Pool<StubDriver>, n: u32) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.status().waiting < n {
        assert!(Instant::now() < deadline, "waiters never blocked");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_shutdown_closes_idle_connections() {
    let (pool, driver) = pool_with_grace(4, Some(Duration::from_secs(1)));

    let report = pool.shutdown();

    assert_eq!(
        report,
        ShutdownReport {
            closed_idle: 4,
            closed_on_release: 0,
            outstanding: 0,
        }
    );
    assert!(pool.is_closed());
    assert!(driver.all_closed_once());
    assert_eq!(pool.status().idle, 0);
}

#[test]
fn test_checkout_after_shutdown_fails() {
    let (pool, _driver) = pool_with_grace(2, Some(Duration::from_secs(1)));
    pool.shutdown();

    assert!(matches!(pool.get(), Err(PoolError::PoolClosed)));
    assert!(matches!(
        pool.get_timeout(Duration::from_secs(1)),
        Err(PoolError::PoolClosed)
    ));
    assert!(matches!(pool.try_get(), Err(PoolError::PoolClosed)));
    assert!(!PoolError::PoolClosed.is_transient());
}

#[test]
fn test_second_shutdown_is_a_no_op() {
    let (pool, driver) = pool_with_grace(3, Some(Duration::from_secs(1)));

    let first = pool.shutdown();
    assert_eq!(first.closed_idle, 3);

    let second = pool.clone().shutdown();
    assert_eq!(second, ShutdownReport::default());

    // No connection closed twice
    assert_eq!(driver.closed(), 3);
    assert!(driver.all_closed_once());
}

#[test]
fn test_shutdown_wakes_blocked_callers() {
    let (pool, _driver) = pool_with_grace(1, Some(Duration::from_millis(50)));
    let held = pool.get().unwrap();

    let (tx, rx) = mpsc::channel();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let outcome = pool.get().map(|conn| conn.serial());
                tx.send(outcome).unwrap();
            })
        })
        .collect();

    wait_for_waiters(&pool, 3);
    let report = pool.shutdown();
    assert_eq!(report.outstanding, 1);

    for _ in 0..3 {
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, Err(PoolError::PoolClosed)));
    }
    for waiter in waiters {
        waiter.join().unwrap();
    }
    drop(held);
}

#[test]
fn test_release_during_grace_period_closes_connection() {
    let (pool, driver) = pool_with_grace(2, Some(Duration::from_secs(5)));
    let held = pool.get().unwrap();
    let serial = held.serial();

    let releaser = {
        let pool = pool.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            pool.release(held).unwrap();
        })
    };

    let started = Instant::now();
    let report = pool.shutdown();
    releaser.join().unwrap();

    // Returned as soon as the last connection came back
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        report,
        ShutdownReport {
            closed_idle: 1,
            closed_on_release: 1,
            outstanding: 0,
        }
    );
    assert!(report.is_complete());
    assert_eq!(driver.close_count(serial), Some(1));
    assert!(driver.all_closed_once());
    assert_eq!(pool.status().idle, 0);
}

#[test]
fn test_expired_grace_period_reports_outstanding() {
    let (pool, driver) = pool_with_grace(3, Some(Duration::from_millis(50)));
    let held = pool.get().unwrap();
    let serial = held.serial();

    let started = Instant::now();
    let report = pool.shutdown();
    assert!(started.elapsed() >= Duration::from_millis(50));

    assert_eq!(report.closed_idle, 2);
    assert_eq!(report.outstanding, 1);
    assert!(!report.is_complete());
    assert_eq!(driver.live(), 1);

    // The holder can still use it; it is closed when handed back
    drop(held);
    assert_eq!(driver.close_count(serial), Some(1));
    assert_eq!(driver.live(), 0);
    assert_eq!(pool.status().in_use, 0);
    assert_eq!(pool.status().idle, 0);
}

#[test]
fn test_unbounded_grace_waits_for_every_release() {
    let (pool, driver) = pool_with_grace(2, None);
    let a = pool.get().unwrap();
    let b = pool.get().unwrap();

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        drop(a);
        thread::sleep(Duration::from_millis(30));
        drop(b);
    });

    let report = pool.shutdown();
    releaser.join().unwrap();

    assert_eq!(report.closed_idle, 0);
    assert_eq!(report.closed_on_release, 2);
    assert_eq!(report.outstanding, 0);
    assert!(driver.all_closed_once());
}

#[test]
fn test_zero_grace_returns_immediately() {
    let (pool, driver) = pool_with_grace(2, Some(Duration::ZERO));
    let held = pool.get().unwrap();

    let report = pool.shutdown();
    assert_eq!(report.closed_idle, 1);
    assert_eq!(report.outstanding, 1);

    pool.release(held).unwrap();
    assert!(driver.all_closed_once());
}

#[test]
fn test_dropping_last_reference_closes_connections() {
    let (pool, driver) = pool_with_grace(3, Some(Duration::from_secs(1)));
    let held = pool.get().unwrap();

    // The guard keeps the pool's connections alive
    drop(pool);
    assert_eq!(driver.closed(), 0);

    drop(held);
    assert!(driver.all_closed_once());
}

#[test]
fn test_metrics_after_shutdown() {
    let (pool, _driver) = pool_with_grace(2, Some(Duration::from_secs(1)));
    let _ = pool.get().unwrap();
    pool.shutdown();
    let _ = pool.get();

    let metrics = pool.metrics();
    assert_eq!(metrics.connections_created, 2);
    assert_eq!(metrics.connections_closed, 2);
    assert_eq!(metrics.checkouts_successful, 1);
    assert_eq!(metrics.checkouts_failed, 1);
}
