//! Checkout and release tests.
//!
//! Covers blocking, timeouts, wakeups, hand-out order, and exclusive
//! ownership under concurrent traffic.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use connpool::{ConnectionState, Pool, PoolError, QueueStrategy};
use connpool_testing::{StubDriver, init_tracing};

fn pool(size: u32) -> (Pool<StubDriver>, StubDriver) {
    init_tracing();
    let driver = StubDriver::new();
    let pool = Pool::builder(driver.clone())
        .max_connections(size)
        .build()
        .unwrap();
    (pool, driver)
}

/// Spin until `n` callers are blocked in `get()`.
fn wait_for_waiters(pool: &Pool<StubDriver>, n: u32) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.status().waiting < n {
        assert!(Instant::now() < deadline, "waiters never blocked");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_third_checkout_times_out_then_succeeds_after_release() {
    let (pool, _driver) = pool(2);

    let first = pool.get().unwrap();
    let second = pool.get().unwrap();

    let started = Instant::now();
    let err = pool.get_timeout(Duration::from_millis(100)).unwrap_err();
    assert!(matches!(err, PoolError::Timeout(d) if d == Duration::from_millis(100)));
    assert!(started.elapsed() >= Duration::from_millis(100));

    pool.release(first).unwrap();

    let third = pool
        .try_get()
        .unwrap()
        .expect("released connection is immediately available");
    assert_eq!(pool.status().in_use, 2);

    drop(second);
    drop(third);
    assert_eq!(pool.status().idle, 2);
}

#[test]
fn test_timeout_on_exhausted_pool_leaves_state_unchanged() {
    let (pool, driver) = pool(1);
    let held = pool.get().unwrap();
    let before = pool.status();

    let err = pool.get_timeout(Duration::from_millis(30)).unwrap_err();
    assert!(matches!(err, PoolError::Timeout(_)));
    assert!(err.is_transient());

    assert_eq!(pool.status(), before);
    assert_eq!(driver.opened(), 1);

    let metrics = pool.metrics();
    assert_eq!(metrics.timeouts, 1);
    assert_eq!(metrics.checkouts_failed, 1);
    assert_eq!(metrics.checkouts_successful, 1);
    drop(held);
}

#[test]
fn test_configured_timeout_applies_to_get() {
    init_tracing();
    let pool = Pool::builder(StubDriver::new())
        .max_connections(1)
        .connection_timeout(Duration::from_millis(20))
        .build()
        .unwrap();

    let _held = pool.get().unwrap();
    assert!(matches!(
        pool.get(),
        Err(PoolError::Timeout(d)) if d == Duration::from_millis(20)
    ));
}

#[test]
fn test_get_blocks_until_release() {
    let (pool, _driver) = pool(1);
    let held = pool.get().unwrap();
    let held_id = held.metadata().id;

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || {
            let conn = pool.get().unwrap();
            tx.send(conn.metadata().id).unwrap();
        })
    };

    wait_for_waiters(&pool, 1);
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    pool.release(held).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), held_id);
    waiter.join().unwrap();
}

#[test]
fn test_one_release_unblocks_exactly_one_waiter() {
    let (pool, _driver) = pool(1);
    let held = pool.get().unwrap();

    let (tx, rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let done_rx = Arc::new(parking_lot::Mutex::new(done_rx));

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            let tx = tx.clone();
            let done_rx = Arc::clone(&done_rx);
            thread::spawn(move || {
                let conn = pool.get_timeout(Duration::from_secs(10)).unwrap();
                tx.send(()).unwrap();
                // Hold the connection until the test says so
                done_rx.lock().recv().unwrap();
                drop(conn);
            })
        })
        .collect();

    wait_for_waiters(&pool, 3);
    pool.release(held).unwrap();

    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(pool.status().waiting, 2);

    // Each handback serves the next waiter
    for _ in 0..2 {
        done_tx.send(()).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    done_tx.send(()).unwrap();
    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(pool.status().idle, 1);
}

#[test]
fn test_try_get_never_blocks() {
    let (pool, _driver) = pool(1);
    let held = pool.try_get().unwrap().unwrap();
    assert!(pool.try_get().unwrap().is_none());
    drop(held);
    assert!(pool.try_get().unwrap().is_some());
}

#[test]
fn test_lifo_reuses_most_recently_released() {
    let (pool, _driver) = pool(3);

    let conns: Vec<_> = (0..3).map(|_| pool.get().unwrap()).collect();
    let ids: Vec<u64> = conns.iter().map(|c| c.metadata().id).collect();
    for conn in conns {
        pool.release(conn).unwrap();
    }

    // Last released comes out first
    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    let c = pool.get().unwrap();
    assert_eq!(
        [a.metadata().id, b.metadata().id, c.metadata().id],
        [ids[2], ids[1], ids[0]]
    );
}

#[test]
fn test_fifo_rotates_through_connections() {
    init_tracing();
    let pool = Pool::builder(StubDriver::new())
        .max_connections(3)
        .queue_strategy(QueueStrategy::Fifo)
        .build()
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..6 {
        let conn = pool.get().unwrap();
        seen.push(conn.serial());
        pool.release(conn).unwrap();
    }

    assert_eq!(seen, vec![1, 2, 3, 1, 2, 3]);
}

#[test]
fn test_guard_derefs_to_driver_connection() {
    let (pool, _driver) = pool(1);

    let mut conn = pool.get().unwrap();
    conn.execute("CREATE DATABASE IF NOT EXISTS testdb").unwrap();
    conn.execute("USE testdb").unwrap();
    assert_eq!(conn.metadata().state, ConnectionState::CheckedOut);
    pool.release(conn).unwrap();

    // Same session comes back, with its history
    let conn = pool.get().unwrap();
    assert_eq!(conn.statements().len(), 2);
    assert_eq!(conn.metadata().checkout_count, 2);
}

#[test]
fn test_release_to_other_pool_is_rejected() {
    let (first, _) = pool(1);
    let (second, _) = pool(1);

    let conn = first.get().unwrap();
    let id = conn.metadata().id;

    let err = second.release(conn).unwrap_err();
    assert!(matches!(err, PoolError::InvalidRelease { connection_id } if connection_id == id));

    // Neither pool's counts were disturbed
    assert_eq!(first.status().idle, 1);
    assert_eq!(first.status().in_use, 0);
    assert_eq!(second.status().idle, 1);
    assert_eq!(second.metrics().invalid_releases, 1);
}

#[test]
fn test_concurrent_checkouts_never_share_a_connection() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let (pool, driver) = pool(3);
    let barrier = Arc::new(Barrier::new(THREADS));
    let conflicts = Arc::new(AtomicUsize::new(0));
    let invariant_breaks = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            let conflicts = Arc::clone(&conflicts);
            let invariant_breaks = Arc::clone(&invariant_breaks);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let conn = pool.get_timeout(Duration::from_secs(10)).unwrap();
                    if !conn.enter() {
                        conflicts.fetch_add(1, Ordering::SeqCst);
                    }
                    let status = pool.status();
                    if status.idle + status.in_use != status.size {
                        invariant_breaks.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    conn.exit();
                    pool.release(conn).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(conflicts.load(Ordering::SeqCst), 0);
    assert_eq!(invariant_breaks.load(Ordering::SeqCst), 0);
    assert_eq!(driver.opened(), 3);

    let status = pool.status();
    assert_eq!(status.idle, 3);
    assert_eq!(status.in_use, 0);
    assert_eq!(status.waiting, 0);

    let metrics = pool.metrics();
    assert_eq!(metrics.checkouts_successful, (THREADS * ROUNDS) as u64);
    assert_eq!(metrics.checkouts_failed, 0);
}

#[test]
fn test_every_release_reaches_a_waiter() {
    const WAITERS: usize = 6;

    let (pool, _driver) = pool(2);
    let held: Vec<_> = (0..2).map(|_| pool.get().unwrap()).collect();

    let (tx, rx) = mpsc::channel();
    let handles: Vec<_> = (0..WAITERS)
        .map(|_| {
            let pool = pool.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let conn = pool.get_timeout(Duration::from_secs(10)).unwrap();
                tx.send(conn.serial()).unwrap();
            })
        })
        .collect();

    wait_for_waiters(&pool, WAITERS as u32);
    for conn in held {
        pool.release(conn).unwrap();
    }

    let served: Vec<u32> = (0..WAITERS)
        .map(|_| rx.recv_timeout(Duration::from_secs(10)).unwrap())
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let distinct: HashSet<u32> = served.iter().copied().collect();
    assert!(distinct.is_subset(&HashSet::from([1, 2])));
    assert_eq!(pool.status().idle, 2);
}

#[test]
fn test_timed_out_waiter_does_not_hold_a_connection() {
    let (pool, _driver) = pool(1);
    let held = pool.get().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.get_timeout(Duration::from_millis(50)).map(|c| c.serial()))
    };

    // Release right around the waiter's deadline; either outcome is fine,
    // but the connection must end up in exactly one place.
    thread::sleep(Duration::from_millis(50));
    pool.release(held).unwrap();

    let outcome = waiter.join().unwrap();
    match outcome {
        Ok(serial) => assert_eq!(serial, 1),
        Err(err) => assert!(matches!(err, PoolError::Timeout(_))),
    }

    let status = pool.status();
    assert_eq!(status.idle, 1);
    assert_eq!(status.in_use, 0);
}
