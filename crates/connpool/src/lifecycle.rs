//! Per-connection lifecycle bookkeeping.

use std::fmt;
use std::time::{Duration, Instant};

/// Where a pooled connection currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Sitting in the idle store, owned by the pool.
    Idle,
    /// Owned by exactly one caller.
    CheckedOut,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::CheckedOut => f.write_str("checked out"),
        }
    }
}

/// Metadata the pool keeps for every connection it created.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Pool-assigned id. Unique within a pool and never reused.
    pub id: u64,
    /// When the driver created the connection.
    pub created_at: Instant,
    /// When the connection was last handed to a caller.
    pub last_checkout_at: Option<Instant>,
    /// How many times the connection has been checked out.
    pub checkout_count: u64,
    /// Current state.
    pub state: ConnectionState,
}

impl ConnectionMetadata {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            last_checkout_at: None,
            checkout_count: 0,
            state: ConnectionState::Idle,
        }
    }

    /// Time since the connection was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether the connection has outlived `max_lifetime`.
    #[must_use]
    pub fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|lifetime| self.age() >= lifetime)
    }

    pub(crate) fn mark_checked_out(&mut self) {
        self.state = ConnectionState::CheckedOut;
        self.last_checkout_at = Some(Instant::now());
        self.checkout_count += 1;
    }

    pub(crate) fn mark_idle(&mut self) {
        self.state = ConnectionState::Idle;
    }
}

/// Why a connection is replaced on checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecycleReason {
    /// Older than the configured maximum lifetime.
    Expired,
    /// Failed [`Connection::is_valid`](crate::Connection::is_valid).
    Invalid,
}

impl fmt::Display for RecycleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("expired"),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata_is_idle() {
        let meta = ConnectionMetadata::new(1);
        assert_eq!(meta.id, 1);
        assert_eq!(meta.state, ConnectionState::Idle);
        assert_eq!(meta.checkout_count, 0);
        assert!(meta.last_checkout_at.is_none());
    }

    #[test]
    fn test_checkout_bookkeeping() {
        let mut meta = ConnectionMetadata::new(1);
        meta.mark_checked_out();
        assert_eq!(meta.state, ConnectionState::CheckedOut);
        assert_eq!(meta.checkout_count, 1);
        assert!(meta.last_checkout_at.is_some());

        meta.mark_idle();
        meta.mark_checked_out();
        assert_eq!(meta.checkout_count, 2);
    }

    #[test]
    fn test_expiry() {
        let meta = ConnectionMetadata::new(1);
        assert!(!meta.is_expired(None));
        assert!(!meta.is_expired(Some(Duration::from_secs(3600))));

        std::thread::sleep(Duration::from_millis(5));
        assert!(meta.is_expired(Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Idle.to_string(), "idle");
        assert_eq!(ConnectionState::CheckedOut.to_string(), "checked out");
    }
}
