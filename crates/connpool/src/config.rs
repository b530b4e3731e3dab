//! Pool configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::PoolError;

/// Order in which idle connections are handed out.
///
/// The choice is observable under contention: `Lifo` keeps a small hot set of
/// connections busy and lets the rest sit idle, `Fifo` rotates through every
/// connection evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueStrategy {
    /// Most recently released connection first.
    #[default]
    Lifo,
    /// Least recently released connection first.
    Fifo,
}

impl FromStr for QueueStrategy {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lifo" | "stack" => Ok(Self::Lifo),
            "fifo" | "queue" => Ok(Self::Fifo),
            other => Err(PoolError::Config(format!("unknown queue strategy: {other}"))),
        }
    }
}

/// Configuration for a [`Pool`](crate::Pool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of connections the pool opens at construction and keeps for
    /// its whole lifetime.
    pub max_connections: u32,

    /// Default wait used by [`Pool::get()`](crate::Pool::get).
    ///
    /// `None` waits until a connection is released or the pool shuts down.
    pub connection_timeout: Option<Duration>,

    /// Grace period [`Pool::shutdown()`](crate::Pool::shutdown) waits for
    /// checked-out connections. `None` waits indefinitely.
    pub shutdown_timeout: Option<Duration>,

    /// Idle connection selection order.
    pub queue_strategy: QueueStrategy,

    /// Validate connections with [`Connection::is_valid`](crate::Connection::is_valid)
    /// on checkout and replace broken ones.
    pub test_on_checkout: bool,

    /// Replace connections older than this on checkout.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: None,
            shutdown_timeout: Some(Duration::from_secs(30)),
            queue_strategy: QueueStrategy::Lifo,
            test_on_checkout: false,
            max_lifetime: None,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool size.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the default checkout timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Wait indefinitely in [`Pool::get()`](crate::Pool::get).
    #[must_use]
    pub fn no_connection_timeout(mut self) -> Self {
        self.connection_timeout = None;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the idle connection selection order.
    #[must_use]
    pub fn queue_strategy(mut self, strategy: QueueStrategy) -> Self {
        self.queue_strategy = strategy;
        self
    }

    /// Enable or disable validation on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Check the configuration for values the pool cannot work with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.max_lifetime == Some(Duration::ZERO) {
            return Err(PoolError::Config(
                "max_lifetime must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Parse pool settings from a connection string.
    ///
    /// Understands the ADO.NET-style pooling keys:
    /// ```text
    /// Max Pool Size=10;Connection Timeout=5;Shutdown Timeout=30;
    /// Pool Strategy=fifo;Test On Checkout=true;Connection Lifetime=600;
    /// ```
    ///
    /// A `Connection Timeout` or `Connection Lifetime` of `0` means unlimited.
    /// Server and credential keys are ignored here; see
    /// [`ConnectOptions::from_connection_string`](crate::ConnectOptions::from_connection_string).
    pub fn from_connection_string(conn_str: &str) -> Result<Self, PoolError> {
        let mut config = Self::default();

        for (key, value) in key_values(conn_str)? {
            match key.as_str() {
                "max pool size" | "pool size" | "max connections" => {
                    config.max_connections = value
                        .parse()
                        .map_err(|_| PoolError::Config(format!("invalid pool size: {value}")))?;
                }
                "connection timeout" | "connect timeout" | "acquire timeout" => {
                    let secs = parse_secs(value)?;
                    config.connection_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "shutdown timeout" => {
                    config.shutdown_timeout = Some(Duration::from_secs(parse_secs(value)?));
                }
                "pool strategy" | "queue strategy" => {
                    config.queue_strategy = value.parse()?;
                }
                "test on checkout" | "validate connection" => {
                    config.test_on_checkout = parse_bool(value)?;
                }
                "connection lifetime" | "max lifetime" => {
                    let secs = parse_secs(value)?;
                    config.max_lifetime = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "server" | "data source" | "host" | "address" | "url" | "port" | "user id"
                | "uid" | "user" | "username" | "password" | "pwd" => {}
                _ => {
                    // Ignore unknown options for forward compatibility
                    tracing::debug!(
                        key = %key,
                        value = value,
                        "ignoring unknown connection string option"
                    );
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

/// Split a `key=value;key=value` string into lower-cased keys and trimmed values.
pub(crate) fn key_values(conn_str: &str) -> Result<Vec<(String, &str)>, PoolError> {
    let mut pairs = Vec::new();

    for part in conn_str.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| PoolError::Config(format!("invalid key-value: {part}")))?;

        pairs.push((key.trim().to_lowercase(), value.trim()));
    }

    Ok(pairs)
}

fn parse_secs(value: &str) -> Result<u64, PoolError> {
    value
        .parse()
        .map_err(|_| PoolError::Config(format!("invalid timeout: {value}")))
}

fn parse_bool(value: &str) -> Result<bool, PoolError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(PoolError::Config(format!("invalid boolean: {value}"))),
    }
}
