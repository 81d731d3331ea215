//! Pool options.

use std::time::Duration;

use indexmap::IndexMap;

use crate::error::{QueryError, QueryResult};
use crate::pool::DEFAULT_ACQUIRE_TIMEOUT;

/// Default maximum pool population.
pub const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// How a [`ConnectionPool`](crate::pool::ConnectionPool) is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of connections.
    pub max_connections: usize,
    /// Maximum time to wait for a connection.
    pub acquire_timeout: Duration,
    /// Share one connection between every caller.
    pub single_connection: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            single_connection: false,
        }
    }
}

impl PoolOptions {
    /// Create default pool options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max connections.
    pub fn max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    /// Set acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Use a single shared connection.
    pub fn single_connection(mut self, single: bool) -> Self {
        self.single_connection = single;
        self
    }

    /// Read `max_connections`, `pool_timeout` (seconds) and
    /// `single_connection` from URL parameters. Other keys are ignored.
    pub fn from_params(params: &IndexMap<String, String>) -> QueryResult<Self> {
        let mut options = Self::default();
        if let Some(value) = params.get("max_connections") {
            options.max_connections = parse_param("max_connections", value)?;
            if options.max_connections == 0 {
                return Err(QueryError::invalid_connection_string(
                    "max_connections must be at least 1",
                ));
            }
        }
        if let Some(value) = params.get("pool_timeout") {
            options.acquire_timeout = Duration::from_secs(parse_param("pool_timeout", value)?);
        }
        if let Some(value) = params.get("single_connection") {
            options.single_connection = parse_param("single_connection", value)?;
        }
        Ok(options)
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> QueryResult<T> {
    value.parse().map_err(|_| {
        QueryError::invalid_connection_string(format!("invalid value '{value}' for {key}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let options = PoolOptions::new();
        assert_eq!(options.max_connections, 4);
        assert_eq!(options.acquire_timeout, Duration::from_secs(5));
        assert!(!options.single_connection);
    }

    #[test]
    fn test_from_params() {
        let options = PoolOptions::from_params(&params(&[
            ("max_connections", "10"),
            ("pool_timeout", "30"),
            ("single_connection", "true"),
            ("sslmode", "require"),
        ]))
        .unwrap();
        assert_eq!(
            options,
            PoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(30))
                .single_connection(true)
        );
    }

    #[test]
    fn test_invalid_params() {
        for pair in [("max_connections", "0"), ("pool_timeout", "-1"), ("single_connection", "yes")] {
            let err = PoolOptions::from_params(&params(&[pair])).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidConnectionString, "{pair:?}");
        }
    }
}
