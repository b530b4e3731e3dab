//! # connpool-testing
//!
//! Test infrastructure for the connection pool.
//!
//! This crate provides:
//!
//! - [`StubDriver`]: an in-memory [`connpool::Driver`] that records every
//!   connect and close, and can be told to fail specific connect attempts
//! - [`StubConnection`]: the matching connection, with switches to mark it
//!   broken and a busy flag for detecting shared ownership
//! - [`init_tracing`]: log output for tests, filtered by `RUST_LOG`
//!
//! The pool's integration tests live in this crate's `tests/` directory so
//! the pool crate does not need a dev-dependency on this one.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod stub;

pub use stub::{StubConnection, StubDriver, StubError};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber.
///
/// Output goes through the test harness capture. Filtered by `RUST_LOG`,
/// defaulting to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A subscriber installed by an earlier test is fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
