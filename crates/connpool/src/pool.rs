//! Connection pool implementation.
//!
//! The pool opens every connection up front and never grows or shrinks. All
//! shared state lives behind one mutex; a condition variable wakes callers
//! blocked in [`Pool::get()`] when a connection is released or the pool shuts
//! down. Driver calls (`connect`, `is_valid`, `close`) always run with the lock
//! released.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

use crate::config::{PoolConfig, QueueStrategy};
use crate::driver::{ConnectOptions, Connection, Credentials, Driver, DriverError, Endpoint};
use crate::error::PoolError;
use crate::lifecycle::{ConnectionMetadata, RecycleReason};
use crate::status::{PoolMetrics, PoolMetricsInner, PoolStatus, ShutdownReport};

/// Source of pool ids, used to tell pools apart on release.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A fixed-size pool of database connections.
///
/// The pool creates `max_connections` connections when it is built and keeps
/// exactly that many until [`shutdown()`](Pool::shutdown). Callers check a
/// connection out with [`get()`](Pool::get) and hand it back with
/// [`release()`](Pool::release) or simply by dropping the guard.
///
/// `Pool` is a cheap handle; clones share the same connections.
///
/// # Example
///
/// ```rust,ignore
/// use connpool::{Credentials, Endpoint, Pool};
///
/// let pool = Pool::builder(driver)
///     .endpoint("tcp://127.0.0.1:4000".parse()?)
///     .credentials(Credentials::new("root", ""))
///     .max_connections(10)
///     .build()?;
///
/// let conn = pool.get()?;
/// // Use connection...
/// pool.release(conn)?;
///
/// pool.shutdown();
/// ```
pub struct Pool<D: Driver> {
    inner: Arc<PoolInner<D>>,
}

struct PoolInner<D: Driver> {
    /// Process-unique pool id.
    id: u64,

    /// Session factory.
    driver: D,

    /// Where and as whom to connect.
    options: ConnectOptions,

    /// Pool configuration.
    config: PoolConfig,

    /// Idle store, checked-out ledger, and the closed flag.
    state: Mutex<PoolState<D::Connection>>,

    /// Signalled when a connection enters the idle store or the pool closes.
    available: Condvar,

    /// Signalled when the last checked-out connection comes back after close.
    drained: Condvar,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,
}

/// A connection together with the pool's bookkeeping for it.
struct PoolEntry<C> {
    conn: C,
    meta: ConnectionMetadata,
}

struct PoolState<C> {
    /// Connections ready to be handed out. Released connections go on the back.
    idle: VecDeque<PoolEntry<C>>,

    /// Checked-out connection ids and when they were handed out.
    checked_out: HashMap<u64, Instant>,

    /// Set once by `shutdown()`.
    closed: bool,

    /// Callers blocked in `get()`.
    waiting: u32,

    /// Connections closed on release after the pool was shut down.
    closed_on_release: u32,

    /// Counter for generating connection ids.
    next_connection_id: u64,
}

impl<C> PoolState<C> {
    fn next_connection_id(&mut self) -> u64 {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Move one idle connection into the checked-out ledger.
    fn take_idle(&mut self, strategy: QueueStrategy) -> Option<PoolEntry<C>> {
        let mut entry = match strategy {
            QueueStrategy::Lifo => self.idle.pop_back(),
            QueueStrategy::Fifo => self.idle.pop_front(),
        }?;

        entry.meta.mark_checked_out();
        self.checked_out.insert(entry.meta.id, Instant::now());
        Some(entry)
    }
}

impl<D: Driver> Pool<D> {
    /// Create a new pool builder around `driver`.
    #[must_use]
    pub fn builder(driver: D) -> PoolBuilder<D> {
        PoolBuilder::new(driver)
    }

    /// Create a pool and open all of its connections.
    ///
    /// Fails with [`PoolError::Init`] if the driver cannot open one of them;
    /// connections opened before the failure are closed first.
    pub fn new(driver: D, options: ConnectOptions, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let size = config.max_connections;
        let inner = Arc::new(PoolInner {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            driver,
            options,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(size as usize),
                checked_out: HashMap::with_capacity(size as usize),
                closed: false,
                waiting: 0,
                closed_on_release: 0,
                next_connection_id: 1,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
        });

        inner.fill()?;

        tracing::info!(
            pool_id = inner.id,
            endpoint = %inner.options.endpoint,
            size,
            strategy = ?inner.config.queue_strategy,
            "connection pool created"
        );

        Ok(Self { inner })
    }

    /// Create a pool from a connection string carrying both the server
    /// settings and the pool settings.
    ///
    /// ```text
    /// Server=tcp://127.0.0.1:4000;User Id=root;Password=;Max Pool Size=10;
    /// ```
    pub fn from_connection_string(driver: D, conn_str: &str) -> Result<Self, PoolError> {
        let options = ConnectOptions::from_connection_string(conn_str)?;
        let config = PoolConfig::from_connection_string(conn_str)?;
        Self::new(driver, options, config)
    }

    /// Get a connection from the pool.
    ///
    /// Waits up to the configured
    /// [`connection_timeout`](PoolConfig::connection_timeout), or until a
    /// connection is released or the pool shuts down if none is set.
    pub fn get(&self) -> Result<PooledConnection<D>, PoolError> {
        self.checkout(self.inner.config.connection_timeout)
    }

    /// Get a connection, waiting at most `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<PooledConnection<D>, PoolError> {
        self.checkout(Some(timeout))
    }

    /// Try to get a connection without waiting.
    ///
    /// Returns `None` if no connections are immediately available.
    pub fn try_get(&self) -> Result<Option<PooledConnection<D>>, PoolError> {
        let entry = {
            let mut state = self.inner.state.lock();
            if state.closed {
                drop(state);
                self.inner.metrics.lock().checkouts_failed += 1;
                return Err(PoolError::PoolClosed);
            }
            state.take_idle(self.inner.config.queue_strategy)
        };

        match entry {
            Some(entry) => self.hand_out(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Get a connection without blocking the async executor.
    ///
    /// The wait runs on Tokio's blocking thread pool. If the returned future is
    /// dropped early, a connection the background wait still obtains is
    /// released straight back to the pool.
    ///
    /// Returns [`PoolError::Cancelled`] if the runtime cancels the background
    /// task; the pool stays open.
    #[cfg(feature = "tokio")]
    pub async fn get_async(&self) -> Result<PooledConnection<D>, PoolError> {
        let pool = self.clone();
        match tokio::task::spawn_blocking(move || pool.get()).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {
                tracing::debug!(pool_id = self.inner.id, "async checkout task cancelled");
                Err(PoolError::Cancelled)
            }
        }
    }

    /// Return a connection to the pool.
    ///
    /// Equivalent to dropping the guard, except that a connection belonging to
    /// a different pool is reported as [`PoolError::InvalidRelease`]. The
    /// rejected connection goes back to the pool that issued it.
    pub fn release(&self, conn: PooledConnection<D>) -> Result<(), PoolError> {
        if !Arc::ptr_eq(&self.inner, &conn.pool) {
            let connection_id = conn.metadata().id;
            self.inner.metrics.lock().invalid_releases += 1;
            tracing::warn!(
                pool_id = self.inner.id,
                owner_pool_id = conn.pool.id,
                connection_id,
                "rejected release of a connection from another pool"
            );
            // Dropping the guard returns it to its own pool
            drop(conn);
            return Err(PoolError::InvalidRelease { connection_id });
        }

        conn.release()
    }

    /// Close the pool.
    ///
    /// Marks the pool closed, wakes every blocked caller with
    /// [`PoolError::PoolClosed`], closes the idle connections, then waits for
    /// checked-out connections to come back for up to
    /// [`shutdown_timeout`](PoolConfig::shutdown_timeout). Connections returned
    /// after this point are closed instead of pooled.
    ///
    /// Calling this again is a no-op.
    pub fn shutdown(&self) -> ShutdownReport {
        let idle = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return ShutdownReport::default();
            }
            state.closed = true;
            self.inner.available.notify_all();
            state.idle.drain(..).collect::<Vec<_>>()
        };

        tracing::info!(
            pool_id = self.inner.id,
            idle = idle.len(),
            "shutting down connection pool"
        );

        let mut report = ShutdownReport::default();
        for entry in idle {
            self.inner.close_connection(entry.conn, entry.meta.id);
            report.closed_idle += 1;
        }

        let deadline = self
            .inner
            .config
            .shutdown_timeout
            .and_then(|grace| Instant::now().checked_add(grace));

        let mut state = self.inner.state.lock();
        while !state.checked_out.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self.inner.drained.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.drained.wait(&mut state),
            }
        }
        report.closed_on_release = state.closed_on_release;
        report.outstanding = state.checked_out.len() as u32;
        drop(state);

        if report.is_complete() {
            tracing::info!(
                pool_id = self.inner.id,
                closed = report.closed_idle + report.closed_on_release,
                "connection pool closed"
            );
        } else {
            tracing::warn!(
                pool_id = self.inner.id,
                outstanding = report.outstanding,
                "shutdown grace period elapsed; outstanding connections close on release"
            );
        }

        report
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            idle: state.idle.len() as u32,
            in_use: state.checked_out.len() as u32,
            waiting: state.waiting,
            size: self.inner.config.max_connections,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        self.inner
            .metrics
            .lock()
            .snapshot(self.inner.created_at.elapsed())
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the connect options the pool opens sessions with.
    #[must_use]
    pub fn connect_options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    /// Get the driver.
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    fn checkout(&self, timeout: Option<Duration>) -> Result<PooledConnection<D>, PoolError> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let strategy = self.inner.config.queue_strategy;

        let entry = {
            let mut state = self.inner.state.lock();
            loop {
                if state.closed {
                    drop(state);
                    self.inner.metrics.lock().checkouts_failed += 1;
                    return Err(PoolError::PoolClosed);
                }

                if let Some(entry) = state.take_idle(strategy) {
                    break entry;
                }

                tracing::trace!(pool_id = self.inner.id, "waiting for a connection");

                state.waiting += 1;
                let timed_out = match deadline {
                    Some(deadline) => self
                        .inner
                        .available
                        .wait_until(&mut state, deadline)
                        .timed_out(),
                    None => {
                        self.inner.available.wait(&mut state);
                        false
                    }
                };
                state.waiting -= 1;

                if timed_out {
                    // A release may have landed between the timeout and
                    // reacquiring the lock.
                    if !state.closed {
                        if let Some(entry) = state.take_idle(strategy) {
                            break entry;
                        }
                    }
                    drop(state);

                    let timeout = timeout.unwrap_or_default();
                    {
                        let mut metrics = self.inner.metrics.lock();
                        metrics.checkouts_failed += 1;
                        metrics.timeouts += 1;
                    }
                    tracing::debug!(
                        pool_id = self.inner.id,
                        ?timeout,
                        "timed out waiting for a connection"
                    );
                    return Err(PoolError::Timeout(timeout));
                }
            }
        };

        self.hand_out(entry)
    }

    /// Run checkout-time recycling and wrap the entry in a guard.
    ///
    /// A broken connection whose replacement cannot be opened is parked at the
    /// cold end of the idle store and the next idle connection is tried, so
    /// one dead session cannot shadow healthy ones. Each connection is tried
    /// at most once per call.
    fn hand_out(
        &self,
        mut entry: PoolEntry<D::Connection>,
    ) -> Result<PooledConnection<D>, PoolError> {
        let strategy = self.inner.config.queue_strategy;
        let mut tried = Vec::new();

        let entry = loop {
            let Some(reason) = self.inner.recycle_reason(&mut entry) else {
                break entry;
            };

            let (broken, source) = match self.inner.recycle(entry, reason) {
                Recycled::Fresh(entry) | Recycled::Kept(entry) => break entry,
                Recycled::Failed(broken, source) => (broken, source),
            };

            tried.push(broken.meta.id);
            self.inner.park(broken);

            let next = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    None
                } else {
                    state.take_idle(strategy)
                }
            };

            match next {
                Some(next) if !tried.contains(&next.meta.id) => entry = next,
                other => {
                    if let Some(seen) = other {
                        self.inner.park(seen);
                    }
                    self.inner.metrics.lock().checkouts_failed += 1;
                    return Err(PoolError::Connection(source));
                }
            }
        };

        self.inner.metrics.lock().checkouts_successful += 1;
        tracing::trace!(
            pool_id = self.inner.id,
            connection_id = entry.meta.id,
            "connection checked out"
        );

        Ok(PooledConnection {
            entry: Some(entry),
            pool: Arc::clone(&self.inner),
        })
    }
}

/// Outcome of replacing a connection on checkout.
enum Recycled<C> {
    /// A new connection took the old one's place.
    Fresh(PoolEntry<C>),
    /// The replacement failed but the old connection is still usable.
    Kept(PoolEntry<C>),
    /// The replacement failed and the old connection is broken.
    Failed(PoolEntry<C>, DriverError),
}

/// Where a returned connection re-enters the idle store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Next in line for hand-out under LIFO.
    Hot,
    /// Last in line for hand-out under either strategy.
    Cold,
}

impl<D: Driver> PoolInner<D> {
    /// Open every connection. On failure, close what was opened.
    fn fill(&self) -> Result<(), PoolError> {
        let requested = self.config.max_connections;

        for created in 0..requested {
            match self.open_connection() {
                Ok(entry) => {
                    self.state.lock().idle.push_back(entry);
                }
                Err(source) => {
                    tracing::error!(
                        pool_id = self.id,
                        endpoint = %self.options.endpoint,
                        created,
                        requested,
                        error = %source,
                        "failed to open pool connection"
                    );

                    let opened = self.state.lock().idle.drain(..).collect::<Vec<_>>();
                    for entry in opened {
                        self.close_connection(entry.conn, entry.meta.id);
                    }

                    return Err(PoolError::Init {
                        created,
                        requested,
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    fn open_connection(&self) -> Result<PoolEntry<D::Connection>, DriverError> {
        let conn = self.driver.connect(&self.options)?;
        let id = self.state.lock().next_connection_id();
        self.metrics.lock().connections_created += 1;

        tracing::debug!(
            pool_id = self.id,
            connection_id = id,
            endpoint = %self.options.endpoint,
            "opened connection"
        );

        Ok(PoolEntry {
            conn,
            meta: ConnectionMetadata::new(id),
        })
    }

    fn close_connection(&self, conn: D::Connection, id: u64) {
        if let Err(error) = conn.close() {
            tracing::warn!(
                pool_id = self.id,
                connection_id = id,
                error = %error,
                "failed to close connection"
            );
        } else {
            tracing::debug!(pool_id = self.id, connection_id = id, "closed connection");
        }
        self.metrics.lock().connections_closed += 1;
    }

    /// Decide whether a freshly checked-out connection must be replaced.
    ///
    /// With validation on, a broken connection is reported as `Invalid` even
    /// when it has also expired.
    fn recycle_reason(&self, entry: &mut PoolEntry<D::Connection>) -> Option<RecycleReason> {
        if self.config.test_on_checkout {
            let valid = entry.conn.is_valid();
            {
                let mut metrics = self.metrics.lock();
                metrics.validations_performed += 1;
                if !valid {
                    metrics.validations_failed += 1;
                }
            }
            if !valid {
                return Some(RecycleReason::Invalid);
            }
        }

        entry
            .meta
            .is_expired(self.config.max_lifetime)
            .then_some(RecycleReason::Expired)
    }

    /// Swap a checked-out connection for a new one, keeping the pool size.
    ///
    /// The replacement is opened before the old connection is closed. If the
    /// driver fails, an expired connection is kept and a broken one is handed
    /// back to the caller together with the driver error.
    fn recycle(
        &self,
        old: PoolEntry<D::Connection>,
        reason: RecycleReason,
    ) -> Recycled<D::Connection> {
        tracing::debug!(
            pool_id = self.id,
            connection_id = old.meta.id,
            %reason,
            "replacing connection"
        );

        let conn = match self.driver.connect(&self.options) {
            Ok(conn) => conn,
            Err(source) => {
                tracing::warn!(
                    pool_id = self.id,
                    connection_id = old.meta.id,
                    %reason,
                    error = %source,
                    "failed to open replacement connection"
                );
                return match reason {
                    RecycleReason::Expired => Recycled::Kept(old),
                    RecycleReason::Invalid => Recycled::Failed(old, source),
                };
            }
        };

        let mut meta = {
            let mut state = self.state.lock();
            let id = state.next_connection_id();
            state.checked_out.remove(&old.meta.id);
            state.checked_out.insert(id, Instant::now());
            ConnectionMetadata::new(id)
        };
        meta.mark_checked_out();

        {
            let mut metrics = self.metrics.lock();
            metrics.connections_created += 1;
            metrics.connections_recycled += 1;
        }
        self.close_connection(old.conn, old.meta.id);

        Recycled::Fresh(PoolEntry { conn, meta })
    }

    /// Return a broken connection to the cold end of the idle store.
    fn park(&self, entry: PoolEntry<D::Connection>) {
        if let Err(err) = self.check_in(entry, Placement::Cold) {
            tracing::warn!(pool_id = self.id, error = %err, "failed to park broken connection");
        }
    }

    /// Move a connection from the checked-out ledger back to the idle store,
    /// or close it if the pool has shut down.
    fn check_in(
        &self,
        mut entry: PoolEntry<D::Connection>,
        placement: Placement,
    ) -> Result<(), PoolError> {
        let connection_id = entry.meta.id;
        let mut state = self.state.lock();

        let Some(checked_out_at) = state.checked_out.remove(&connection_id) else {
            drop(state);
            self.metrics.lock().invalid_releases += 1;
            tracing::warn!(
                pool_id = self.id,
                connection_id,
                "connection is not checked out from this pool; closing it"
            );
            self.close_connection(entry.conn, connection_id);
            return Err(PoolError::InvalidRelease { connection_id });
        };

        if state.closed {
            state.closed_on_release += 1;
            if state.checked_out.is_empty() {
                self.drained.notify_all();
            }
            drop(state);
            self.close_connection(entry.conn, connection_id);
            return Ok(());
        }

        entry.meta.mark_idle();
        match (placement, self.config.queue_strategy) {
            (Placement::Cold, QueueStrategy::Lifo) => state.idle.push_front(entry),
            _ => state.idle.push_back(entry),
        }
        self.available.notify_one();
        drop(state);

        tracing::trace!(
            pool_id = self.id,
            connection_id,
            held = ?checked_out_at.elapsed(),
            "connection returned to pool"
        );
        Ok(())
    }
}

impl<D: Driver> Drop for PoolInner<D> {
    fn drop(&mut self) {
        // Only idle connections can be left: every guard holds a reference.
        let idle = self.state.get_mut().idle.drain(..).collect::<Vec<_>>();
        for entry in idle {
            self.close_connection(entry.conn, entry.meta.id);
        }
    }
}

impl<D: Driver> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> fmt::Debug for Pool<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.options.endpoint)
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder(driver)
///     .endpoint(Endpoint::new("127.0.0.1", 4000))
///     .credentials(Credentials::new("root", ""))
///     .max_connections(10)
///     .connection_timeout(Duration::from_secs(5))
///     .build()?;
/// ```
pub struct PoolBuilder<D: Driver> {
    driver: D,
    options: ConnectOptions,
    pool_config: PoolConfig,
}

impl<D: Driver> PoolBuilder<D> {
    /// Create a new pool builder with default settings.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            options: ConnectOptions::default(),
            pool_config: PoolConfig::default(),
        }
    }

    /// Set the connect options.
    #[must_use]
    pub fn connect_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the server endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.options.endpoint = endpoint;
        self
    }

    /// Set the login credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.options.credentials = credentials;
        self
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Set the default checkout timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.connection_timeout = Some(timeout);
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_config.shutdown_timeout = timeout;
        self
    }

    /// Set the idle connection selection order.
    #[must_use]
    pub fn queue_strategy(mut self, strategy: QueueStrategy) -> Self {
        self.pool_config.queue_strategy = strategy;
        self
    }

    /// Enable or disable validation on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.pool_config.test_on_checkout = enabled;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.pool_config.max_lifetime = Some(lifetime);
        self
    }

    /// Build the pool, opening every connection.
    pub fn build(self) -> Result<Pool<D>, PoolError> {
        Pool::new(self.driver, self.options, self.pool_config)
    }
}

/// A connection retrieved from the pool.
///
/// Dereferences to the driver's connection type. When dropped, the connection
/// is automatically returned to the pool; [`release()`](Self::release) does the
/// same but reports errors.
pub struct PooledConnection<D: Driver> {
    /// Always `Some` until the guard is released or dropped.
    entry: Option<PoolEntry<D::Connection>>,
    /// Reference to the pool for returning the connection.
    pool: Arc<PoolInner<D>>,
}

#[allow(clippy::expect_used)]
impl<D: Driver> PooledConnection<D> {
    fn entry(&self) -> &PoolEntry<D::Connection> {
        self.entry.as_ref().expect("connection already returned")
    }

    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.entry().meta
    }

    /// Return the connection to the pool that issued it.
    pub fn release(mut self) -> Result<(), PoolError> {
        match self.entry.take() {
            Some(entry) => self.pool.check_in(entry, Placement::Hot),
            None => Ok(()),
        }
    }
}

impl<D: Driver> Deref for PooledConnection<D> {
    type Target = D::Connection;

    fn deref(&self) -> &Self::Target {
        &self.entry().conn
    }
}

#[allow(clippy::expect_used)]
impl<D: Driver> DerefMut for PooledConnection<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .entry
            .as_mut()
            .expect("connection already returned")
            .conn
    }
}

impl<D: Driver> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            if let Err(err) = self.pool.check_in(entry, Placement::Hot) {
                tracing::warn!(error = %err, "failed to return connection on drop");
            }
        }
    }
}

impl<D: Driver> fmt::Debug for PooledConnection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool_id", &self.pool.id)
            .field("metadata", &self.entry.as_ref().map(|entry| &entry.meta))
            .finish()
    }
}
