//! Driver seam.
//!
//! The pool never speaks a wire protocol itself. It asks a [`Driver`] for new
//! sessions and hands them out as opaque [`Connection`] values. Application
//! code issues statements through whatever API the concrete connection type
//! exposes; the pool only needs to validate and close it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::PoolError;

/// Error surfaced by a driver.
///
/// Boxed so driver errors travel through the pool unchanged and can be
/// recovered with [`downcast_ref`](std::error::Error).
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Default port used when an endpoint omits one (TiDB's MySQL-compatible port).
pub const DEFAULT_PORT: u16 = 4000;

/// Default scheme used when an endpoint omits one.
pub const DEFAULT_SCHEME: &str = "tcp";

/// A live database session produced by a [`Driver`].
pub trait Connection: Send + 'static {
    /// Check whether the session is still usable.
    ///
    /// Only called when checkout validation is enabled. Implementations
    /// typically ping the server or inspect a cached error flag.
    fn is_valid(&mut self) -> bool;

    /// Close the session.
    ///
    /// Consumes the connection so it cannot be used afterwards.
    fn close(self) -> Result<(), DriverError>;
}

/// Factory for database sessions.
///
/// Passed to the pool at construction instead of being looked up from a
/// process-wide driver instance, so tests can substitute a stub.
pub trait Driver: Send + Sync + 'static {
    /// Connection type produced by this driver.
    type Connection: Connection;

    /// Open a new session.
    fn connect(&self, options: &ConnectOptions) -> Result<Self::Connection, DriverError>;
}

impl<D: Driver> Driver for Arc<D> {
    type Connection = D::Connection;

    fn connect(&self, options: &ConnectOptions) -> Result<Self::Connection, DriverError> {
        (**self).connect(options)
    }
}

/// Network address of the database server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// URL scheme (`tcp` unless stated otherwise).
    pub scheme: String,
    /// Hostname or IP address. IPv6 addresses are stored without brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create a `tcp` endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: host.into(),
            port,
        }
    }

    /// Parse an endpoint.
    ///
    /// Accepted forms:
    /// ```text
    /// tcp://127.0.0.1:4000
    /// 127.0.0.1:4000
    /// db.internal,4000
    /// [::1]:4000
    /// db.internal
    /// ```
    pub fn parse(input: &str) -> Result<Self, PoolError> {
        let input = input.trim();

        let (scheme, rest) = match input.split_once("://") {
            Some((scheme, rest)) => {
                if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(PoolError::Config(format!("invalid endpoint scheme: {scheme}")));
                }
                (scheme.to_ascii_lowercase(), rest)
            }
            None => (DEFAULT_SCHEME.to_string(), input),
        };

        // Drop any trailing path such as `/testdb`
        let rest = rest.split('/').next().unwrap_or_default();

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| PoolError::Config(format!("unterminated IPv6 address: {input}")))?;
            let port = match after {
                "" => None,
                _ => Some(after.strip_prefix(':').ok_or_else(|| {
                    PoolError::Config(format!("invalid endpoint: {input}"))
                })?),
            };
            (host, port)
        } else if let Some((host, port)) = rest.split_once(',') {
            (host, Some(port))
        } else if let Some((host, port)) = rest.rsplit_once(':') {
            (host, Some(port))
        } else {
            (rest, None)
        };

        let host = host.trim();
        if host.is_empty() {
            return Err(PoolError::Config(format!("endpoint has no host: {input}")));
        }

        let port = match port {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| PoolError::Config(format!("invalid port: {port}")))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

impl FromStr for Endpoint {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// Username/password pair handed to the driver.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password. Never printed by `Debug`.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the driver needs to open a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Server address.
    pub endpoint: Endpoint,
    /// Login credentials.
    pub credentials: Credentials,
}

impl ConnectOptions {
    /// Create connect options from an endpoint and credentials.
    #[must_use]
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Self {
        Self {
            endpoint,
            credentials,
        }
    }

    /// Parse connect options from a connection string.
    ///
    /// ```text
    /// Server=tcp://127.0.0.1:4000;User Id=root;Password=secret;
    /// ```
    ///
    /// Keys the pool does not understand are skipped, including the
    /// pool-sizing keys read by [`PoolConfig::from_connection_string`].
    ///
    /// [`PoolConfig::from_connection_string`]: crate::PoolConfig::from_connection_string
    pub fn from_connection_string(conn_str: &str) -> Result<Self, PoolError> {
        let mut options = Self::default();

        for (key, value) in crate::config::key_values(conn_str)? {
            match key.as_str() {
                "server" | "data source" | "host" | "address" | "url" => {
                    options.endpoint = Endpoint::parse(value)?;
                }
                "port" => {
                    options.endpoint.port = value
                        .parse()
                        .map_err(|_| PoolError::Config(format!("invalid port: {value}")))?;
                }
                "user id" | "uid" | "user" | "username" => {
                    options.credentials.username = value.to_string();
                }
                "password" | "pwd" => {
                    options.credentials.password = value.to_string();
                }
                _ => {
                    tracing::trace!(key = %key, "connect options: skipping key");
                }
            }
        }

        Ok(options)
    }
}
