//! # connpool
//!
//! Fixed-size, thread-safe connection pool for database sessions.
//!
//! The pool opens all of its connections when it is built, hands them out to
//! concurrent callers one at a time, blocks callers (optionally with a
//! deadline) while every connection is in use, and closes everything on
//! shutdown. The database itself is reached through a [`Driver`]
//! implementation supplied by the caller.
//!
//! ## Features
//!
//! - Eager creation of exactly `max_connections` sessions, with cleanup if
//!   any of them fails to open
//! - Blocking checkout with optional timeout, plus non-blocking `try_get`
//! - LIFO (default) or FIFO hand-out order
//! - RAII guard that returns the connection on drop
//! - Detection of connections released to the wrong pool
//! - Graceful shutdown with a configurable grace period
//! - Optional checkout validation and maximum connection lifetime
//! - Status and cumulative metrics
//! - `tokio` feature: `Pool::get_async()` for async callers
//!
//! ## Example
//!
//! ```rust,ignore
//! use connpool::{Credentials, Endpoint, Pool};
//! use std::time::Duration;
//!
//! let pool = Pool::builder(driver)
//!     .endpoint(Endpoint::parse("tcp://127.0.0.1:4000")?)
//!     .credentials(Credentials::new("root", ""))
//!     .max_connections(10)
//!     .connection_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let mut conn = pool.get()?;
//! conn.execute("CREATE DATABASE IF NOT EXISTS testdb")?;
//! pool.release(conn)?;
//!
//! // Check pool status
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//!
//! pool.shutdown();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod status;

// Configuration
pub use config::{PoolConfig, QueueStrategy};

// Driver seam
pub use driver::{ConnectOptions, Connection, Credentials, Driver, DriverError, Endpoint};

// Error types
pub use error::PoolError;

// Pool types
pub use pool::{Pool, PoolBuilder, PooledConnection};
pub use status::{PoolMetrics, PoolStatus, ShutdownReport};

// Lifecycle management
pub use lifecycle::{ConnectionMetadata, ConnectionState};
