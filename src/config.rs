// src/config.rs
use redis::{ConnectionInfo, IntoConnectionInfo};
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::error::{CacheError, CacheResult};
use crate::rate_limit::BackendErrorPolicy;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RECONNECT_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;
pub const DEFAULT_SCAN_BATCH: usize = 100;

/// Connection settings for the cache backend.
///
/// Host and password together switch the whole layer on; without both the
/// handle runs in disabled no-op mode.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub connect_timeout: Duration,
    /// After a failed connect, callers get an immediate miss for this long.
    pub reconnect_backoff: Duration,
    pub keepalive_interval: Duration,
    pub scan_batch_size: usize,
    pub rate_limit_on_error: BackendErrorPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            username: None,
            password: None,
            db: 0,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            reconnect_backoff: Duration::from_secs(DEFAULT_RECONNECT_BACKOFF_SECS),
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            scan_batch_size: DEFAULT_SCAN_BATCH,
            rate_limit_on_error: BackendErrorPolicy::Allow,
        }
    }
}

impl CacheConfig {
    /// Load from the process environment (after `.env`, if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: non_empty("REDIS_HOST"),
            port: parse_or("REDIS_PORT", non_empty("REDIS_PORT"), defaults.port),
            username: non_empty("REDIS_USERNAME"),
            password: non_empty("REDIS_PASSWORD"),
            db: parse_or("REDIS_DB", non_empty("REDIS_DB"), defaults.db),
            connect_timeout: Duration::from_secs(parse_or(
                "REDIS_CONNECT_TIMEOUT_SECS",
                non_empty("REDIS_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            reconnect_backoff: Duration::from_secs(parse_or(
                "REDIS_RECONNECT_BACKOFF_SECS",
                non_empty("REDIS_RECONNECT_BACKOFF_SECS"),
                DEFAULT_RECONNECT_BACKOFF_SECS,
            )),
            keepalive_interval: Duration::from_secs(parse_or(
                "REDIS_KEEPALIVE_SECS",
                non_empty("REDIS_KEEPALIVE_SECS"),
                DEFAULT_KEEPALIVE_SECS,
            )),
            scan_batch_size: parse_or("REDIS_SCAN_BATCH", non_empty("REDIS_SCAN_BATCH"), DEFAULT_SCAN_BATCH)
                .max(1),
            rate_limit_on_error: parse_or(
                "RATE_LIMIT_ON_BACKEND_ERROR",
                non_empty("RATE_LIMIT_ON_BACKEND_ERROR"),
                BackendErrorPolicy::Allow,
            ),
        }
    }

    /// Host and password are both present.
    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.password.is_some()
    }

    /// Redis connection info including credentials.
    pub fn connection_info(&self) -> CacheResult<ConnectionInfo> {
        let host = self.host.as_deref().ok_or(CacheError::Unavailable)?;
        let mut info = (host, self.port).into_connection_info()?;
        info.redis.db = self.db;
        info.redis.username = self.username.clone();
        info.redis.password = self.password.clone();
        Ok(info)
    }

    /// `host:port` for log lines; never includes credentials.
    pub fn display_addr(&self) -> String {
        match &self.host {
            Some(host) => format!("{}:{}", host, self.port),
            None => "<unconfigured>".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(env_var = %name, value = %value, "Invalid value; using default");
                default
            }
        },
        None => default,
    }
}
