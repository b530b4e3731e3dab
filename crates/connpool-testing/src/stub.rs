//! In-memory stub driver.
//!
//! Every connection the stub opens gets a serial number starting at 1, and
//! the driver keeps a record per serial so tests can assert on closes and
//! flip validity after the connection has been handed to the pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use connpool::{ConnectOptions, Connection, Driver, DriverError};
use parking_lot::Mutex;
use thiserror::Error;

/// Errors produced by the stub driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StubError {
    /// Connect attempt rejected by failure injection.
    #[error("connection refused: {endpoint} (attempt {attempt})")]
    ConnectionRefused {
        /// Endpoint the pool tried to reach.
        endpoint: String,
        /// 1-based connect attempt number.
        attempt: u32,
    },

    /// Wrong password.
    #[error("access denied for user '{user}'")]
    AuthenticationFailed {
        /// Username presented.
        user: String,
    },

    /// Statement issued on a broken connection.
    #[error("connection {serial} is broken")]
    Broken {
        /// Serial of the broken connection.
        serial: u32,
    },
}

/// Shared view of one connection, kept by the driver.
#[derive(Debug, Default)]
struct ConnectionRecord {
    broken: AtomicBool,
    busy: AtomicBool,
    closes: AtomicU32,
}

#[derive(Debug, Default)]
struct DriverState {
    attempts: AtomicU32,
    unreachable: AtomicBool,
    fail_attempts: Mutex<Vec<u32>>,
    password: Mutex<Option<String>>,
    connect_delay: Mutex<Option<Duration>>,
    records: Mutex<Vec<Arc<ConnectionRecord>>>,
}

/// In-memory [`Driver`] with failure injection.
///
/// Cloning shares state, so a test can keep a handle after moving the driver
/// into a pool.
#[derive(Debug, Clone, Default)]
pub struct StubDriver {
    state: Arc<DriverState>,
}

impl StubDriver {
    /// Create a driver that accepts every connect.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the given 1-based connect attempt.
    #[must_use]
    pub fn fail_on_attempt(self, attempt: u32) -> Self {
        self.state.fail_attempts.lock().push(attempt);
        self
    }

    /// Only accept connects that present this password.
    #[must_use]
    pub fn require_password(self, password: impl Into<String>) -> Self {
        *self.state.password.lock() = Some(password.into());
        self
    }

    /// Sleep this long inside every connect.
    #[must_use]
    pub fn connect_delay(self, delay: Duration) -> Self {
        *self.state.connect_delay.lock() = Some(delay);
        self
    }

    /// Make every subsequent connect fail (or succeed again).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of connect attempts, successful or not.
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Number of connections opened.
    #[must_use]
    pub fn opened(&self) -> u32 {
        self.state.records.lock().len() as u32
    }

    /// Total number of `close()` calls across all connections.
    #[must_use]
    pub fn closed(&self) -> u32 {
        self.state
            .records
            .lock()
            .iter()
            .map(|record| record.closes.load(Ordering::SeqCst))
            .sum()
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn live(&self) -> u32 {
        self.state
            .records
            .lock()
            .iter()
            .filter(|record| record.closes.load(Ordering::SeqCst) == 0)
            .count() as u32
    }

    /// How many times the connection with `serial` was closed.
    ///
    /// Returns `None` for a serial the driver never issued.
    #[must_use]
    pub fn close_count(&self, serial: u32) -> Option<u32> {
        self.record(serial)
            .map(|record| record.closes.load(Ordering::SeqCst))
    }

    /// Whether every opened connection was closed exactly once.
    #[must_use]
    pub fn all_closed_once(&self) -> bool {
        self.state
            .records
            .lock()
            .iter()
            .all(|record| record.closes.load(Ordering::SeqCst) == 1)
    }

    /// Mark the connection with `serial` broken.
    pub fn break_connection(&self, serial: u32) {
        if let Some(record) = self.record(serial) {
            record.broken.store(true, Ordering::SeqCst);
        }
    }

    /// Mark every connection opened so far broken.
    pub fn break_all(&self) {
        for record in self.state.records.lock().iter() {
            record.broken.store(true, Ordering::SeqCst);
        }
    }

    fn record(&self, serial: u32) -> Option<Arc<ConnectionRecord>> {
        let index = usize::try_from(serial).ok()?.checked_sub(1)?;
        self.state.records.lock().get(index).cloned()
    }
}

impl Driver for StubDriver {
    type Connection = StubConnection;

    fn connect(&self, options: &ConnectOptions) -> Result<StubConnection, DriverError> {
        let attempt = self.state.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if self.state.unreachable.load(Ordering::SeqCst)
            || self.state.fail_attempts.lock().contains(&attempt)
        {
            tracing::debug!(attempt, "stub driver refusing connection");
            return Err(Box::new(StubError::ConnectionRefused {
                endpoint: options.endpoint.to_string(),
                attempt,
            }));
        }

        if let Some(password) = self.state.password.lock().as_deref() {
            if options.credentials.password != password {
                return Err(Box::new(StubError::AuthenticationFailed {
                    user: options.credentials.username.clone(),
                }));
            }
        }

        let record = Arc::new(ConnectionRecord::default());
        let serial = {
            let mut records = self.state.records.lock();
            records.push(Arc::clone(&record));
            records.len() as u32
        };

        Ok(StubConnection {
            serial,
            record,
            statements: Vec::new(),
        })
    }
}

/// Connection produced by [`StubDriver`].
#[derive(Debug)]
pub struct StubConnection {
    serial: u32,
    record: Arc<ConnectionRecord>,
    statements: Vec<String>,
}

impl StubConnection {
    /// Driver-assigned serial number (1-based, in connect order).
    #[must_use]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Record a statement, failing if the connection is broken.
    pub fn execute(&mut self, sql: &str) -> Result<u64, StubError> {
        if self.record.broken.load(Ordering::SeqCst) {
            return Err(StubError::Broken {
                serial: self.serial,
            });
        }
        self.statements.push(sql.to_string());
        Ok(1)
    }

    /// Statements executed on this connection, across all checkouts.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Flag the connection as in use by the caller.
    ///
    /// Returns `false` if it was already flagged, meaning two holders.
    pub fn enter(&self) -> bool {
        !self.record.busy.swap(true, Ordering::SeqCst)
    }

    /// Clear the in-use flag set by [`enter`](Self::enter).
    pub fn exit(&self) {
        self.record.busy.store(false, Ordering::SeqCst);
    }
}

impl Connection for StubConnection {
    fn is_valid(&mut self) -> bool {
        !self.record.broken.load(Ordering::SeqCst)
    }

    fn close(self) -> Result<(), DriverError> {
        self.record.closes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(serial = self.serial, "stub connection closed");
        Ok(())
    }
}
