//! Pool status, metrics, and shutdown reporting.

use std::time::Duration;

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections sitting in the idle store.
    pub idle: u32,
    /// Connections currently checked out.
    pub in_use: u32,
    /// Callers blocked waiting for a connection.
    pub waiting: u32,
    /// Configured pool size.
    pub size: u32,
}

impl PoolStatus {
    /// Percentage of the pool currently checked out (0.0 to 100.0).
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        (f64::from(self.in_use) / f64::from(self.size)) * 100.0
    }

    /// Whether every connection is checked out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.idle == 0 && self.in_use >= self.size
    }
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
pub(crate) struct PoolMetricsInner {
    pub(crate) connections_created: u64,
    pub(crate) connections_closed: u64,
    pub(crate) checkouts_successful: u64,
    pub(crate) checkouts_failed: u64,
    pub(crate) timeouts: u64,
    pub(crate) validations_performed: u64,
    pub(crate) validations_failed: u64,
    pub(crate) connections_recycled: u64,
    pub(crate) invalid_releases: u64,
}

impl PoolMetricsInner {
    pub(crate) fn snapshot(&self, uptime: Duration) -> PoolMetrics {
        PoolMetrics {
            connections_created: self.connections_created,
            connections_closed: self.connections_closed,
            checkouts_successful: self.checkouts_successful,
            checkouts_failed: self.checkouts_failed,
            timeouts: self.timeouts,
            validations_performed: self.validations_performed,
            validations_failed: self.validations_failed,
            connections_recycled: self.connections_recycled,
            invalid_releases: self.invalid_releases,
            uptime,
        }
    }
}

/// Cumulative counters for the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful connection checkouts.
    pub checkouts_successful: u64,
    /// Failed connection checkouts (timeouts, pool closed, replacement failures).
    pub checkouts_failed: u64,
    /// Checkouts that gave up waiting.
    pub timeouts: u64,
    /// Checkout validations performed.
    pub validations_performed: u64,
    /// Checkout validations that found a broken connection.
    pub validations_failed: u64,
    /// Connections replaced because they were broken or expired.
    pub connections_recycled: u64,
    /// Rejected release attempts.
    pub invalid_releases: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate validation success rate (0.0 to 1.0).
    #[must_use]
    pub fn validation_success_rate(&self) -> f64 {
        if self.validations_performed == 0 {
            return 1.0;
        }
        let successful = self.validations_performed - self.validations_failed;
        successful as f64 / self.validations_performed as f64
    }
}

/// Outcome of [`Pool::shutdown()`](crate::Pool::shutdown).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Idle connections closed by the shutdown call itself.
    pub closed_idle: u32,
    /// Connections returned (and closed) while shutdown was waiting.
    pub closed_on_release: u32,
    /// Connections still checked out when the grace period ran out.
    ///
    /// Each is closed when its holder releases or drops it.
    pub outstanding: u32,
}

impl ShutdownReport {
    /// Whether every connection was closed before shutdown returned.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outstanding == 0
    }
}
