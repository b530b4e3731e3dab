//! Pool error types.

use std::time::Duration;

use thiserror::Error;

use crate::driver::DriverError;

/// Errors returned by the connection pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// A connection could not be created while filling the pool.
    ///
    /// Connections created before the failure have already been closed.
    #[error("failed to initialize pool: created {created} of {requested} connections: {source}")]
    Init {
        /// Connections successfully created before the failure.
        created: u32,
        /// Connections the pool was configured to hold.
        requested: u32,
        /// Error reported by the driver.
        #[source]
        source: DriverError,
    },

    /// No connection became available before the deadline.
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    /// The pool has been shut down.
    #[error("pool is closed")]
    PoolClosed,

    /// The connection is not checked out from this pool.
    #[error("connection {connection_id} is not checked out from this pool")]
    InvalidRelease {
        /// Pool-assigned id of the rejected connection.
        connection_id: u64,
    },

    /// The driver failed while replacing a broken or expired connection.
    #[error("connection error: {0}")]
    Connection(#[source] DriverError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The background task running an async checkout was cancelled, which
    /// happens when the Tokio runtime shuts down. The pool itself is intact.
    #[error("checkout task was cancelled")]
    Cancelled,
}

impl PoolError {
    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }

    /// The driver error carried by this error, if any.
    #[must_use]
    pub fn driver_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Init { source, .. } | Self::Connection(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}
