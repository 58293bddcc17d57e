//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::RetryPolicy;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL URL; unset keeps all state in memory
/// - `RPC_TIMEOUT_MS`: per-call reply timeout; unset waits indefinitely
/// - `RETRY_INTERVAL_MS`: sleep between reconnect attempts (default: `500`)
/// - `RETRY_MAX_ATTEMPTS`: reconnect budget, `0` for unbounded (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub rpc_timeout: Option<Duration>,
    pub retry_interval: Duration,
    pub retry_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source. Unparseable
    /// values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            rpc_timeout: number("RPC_TIMEOUT_MS").map(Duration::from_millis),
            retry_interval: number("RETRY_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_interval),
            retry_max_attempts: number("RETRY_MAX_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.retry_max_attempts),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reconnect policy shared by the broker client, the routers and the
    /// stores.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.retry_max_attempts {
            0 => RetryPolicy::unbounded(self.retry_interval),
            n => RetryPolicy::bounded(n, self.retry_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            rpc_timeout: None,
            retry_interval: Duration::from_millis(500),
            retry_max_attempts: 10,
        }
    }
}
