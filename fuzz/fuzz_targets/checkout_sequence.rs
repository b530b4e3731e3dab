//! Drive a pool with an arbitrary sequence of checkouts and releases and
//! check its bookkeeping after every step.

#![no_main]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use arbitrary::Arbitrary;
use connpool::{
    ConnectOptions, Connection, Driver, DriverError, Pool, PoolError, QueueStrategy,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Default)]
struct CountingDriver {
    closed: Arc<AtomicU32>,
}

struct CountingConnection {
    closed: Arc<AtomicU32>,
}

impl Connection for CountingConnection {
    fn is_valid(&mut self) -> bool {
        true
    }

    fn close(self) -> Result<(), DriverError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Driver for CountingDriver {
    type Connection = CountingConnection;

    fn connect(&self, _options: &ConnectOptions) -> Result<CountingConnection, DriverError> {
        Ok(CountingConnection {
            closed: Arc::clone(&self.closed),
        })
    }
}

#[derive(Debug, Arbitrary)]
enum Op {
    Get,
    Release(u8),
    Drop(u8),
    Status,
}

#[derive(Debug, Arbitrary)]
struct Input {
    size: u8,
    fifo: bool,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let size = u32::from(input.size % 16) + 1;
    let queue = if input.fifo {
        QueueStrategy::Fifo
    } else {
        QueueStrategy::Lifo
    };

    let driver = CountingDriver::default();
    let closed = Arc::clone(&driver.closed);
    let pool = Pool::builder(driver)
        .max_connections(size)
        .queue_strategy(queue)
        .shutdown_timeout(Some(Duration::ZERO))
        .build()
        .expect("stub driver never fails");

    let mut held = Vec::new();
    for op in input.ops {
        match op {
            Op::Get => {
                if let Some(conn) = pool.try_get().expect("pool is open") {
                    held.push(conn);
                }
            }
            Op::Release(i) if !held.is_empty() => {
                let conn = held.swap_remove(usize::from(i) % held.len());
                pool.release(conn).expect("own connection");
            }
            Op::Drop(i) if !held.is_empty() => {
                drop(held.swap_remove(usize::from(i) % held.len()));
            }
            _ => {}
        }

        let status = pool.status();
        assert_eq!(status.idle + status.in_use, size);
        assert_eq!(status.in_use as usize, held.len());
    }

    assert_eq!(closed.load(Ordering::SeqCst), 0);
    let report = pool.shutdown();
    assert_eq!(report.closed_idle + report.outstanding, size);
    drop(held);
    assert_eq!(closed.load(Ordering::SeqCst), size);
    assert!(matches!(pool.try_get(), Err(PoolError::PoolClosed)));
});
