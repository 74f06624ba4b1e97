// src/store/redis_backend.rs - Redis-backed KvBackend

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use super::backend::{KeyTtl, KvBackend, ScanPage, ServerStats};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::monitoring::metrics;

/// Redis backend with a single, lazily created multiplexed connection.
///
/// The connection is established on first use under `manager`'s lock, so a
/// burst of concurrent first callers produces one connection attempt. After a
/// fatal error the connection is dropped and re-created on the next call.
///
/// A failed attempt opens a backoff window of `reconnect_backoff`. Callers in
/// that window, including those that were queued behind the failed attempt,
/// get [`CacheError::Unavailable`] at once instead of trying again.
pub struct RedisBackend {
    client: redis::Client,
    addr: String,
    connect_timeout: Duration,
    reconnect_backoff: Duration,
    manager: Mutex<Option<ConnectionManager>>,
    last_failure: parking_lot::Mutex<Option<Instant>>,
}

impl RedisBackend {
    /// Prepares the client. Does not open a connection.
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.connection_info()?)?;
        Ok(Self {
            client,
            addr: config.display_addr(),
            connect_timeout: config.connect_timeout,
            reconnect_backoff: config.reconnect_backoff,
            manager: Mutex::new(None),
            last_failure: parking_lot::Mutex::new(None),
        })
    }

    /// True once a connection has been established and not discarded since.
    pub async fn is_connected(&self) -> bool {
        self.manager.lock().await.is_some()
    }

    fn in_backoff(&self) -> bool {
        self.last_failure
            .lock()
            .is_some_and(|at| at.elapsed() < self.reconnect_backoff)
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        if self.in_backoff() {
            return Err(CacheError::Unavailable);
        }

        let mut slot = self.manager.lock().await;
        if let Some(manager) = slot.as_ref() {
            return Ok(manager.clone());
        }
        // Queued behind an attempt that just failed.
        if self.in_backoff() {
            return Err(CacheError::Unavailable);
        }

        let result = match timeout(self.connect_timeout, ConnectionManager::new(self.client.clone())).await {
            Ok(Ok(manager)) => {
                info!("Redis cache connected ({})", self.addr);
                *slot = Some(manager.clone());
                Ok(manager)
            }
            Ok(Err(e)) => {
                error!("Failed to connect to Redis at {}: {}", self.addr, e);
                Err(e.into())
            }
            Err(_) => {
                error!(
                    "Redis connection to {} timed out after {:?}",
                    self.addr, self.connect_timeout
                );
                Err(CacheError::Timeout {
                    after: self.connect_timeout,
                })
            }
        };

        match result {
            Ok(manager) => {
                self.last_failure.lock().take();
                Ok(manager)
            }
            Err(e) => {
                metrics::record_backend_error("connect");
                *self.last_failure.lock() = Some(Instant::now());
                Err(e)
            }
        }
    }

    /// Maps a command result, discarding the connection on fatal errors.
    async fn finish<T>(&self, op: &'static str, result: RedisResult<T>) -> CacheResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = CacheError::from(e);
                metrics::record_backend_error(op);
                if err.is_fatal_connection_error() {
                    warn!(op, error = %err, "Redis connection lost; reconnecting on next use");
                    self.manager.lock().await.take();
                } else {
                    debug!(op, error = %err, "Redis command failed");
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;
        let result = conn.get::<_, Option<String>>(key).await;
        self.finish("get", result).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let result = conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await;
        self.finish("set_ex", result).await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let result = conn.del::<_, u64>(keys).await;
        self.finish("delete", result).await
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.connection().await?;
        let result = conn.incr::<_, _, i64>(key, 1).await;
        self.finish("incr", result).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<bool>(&mut conn)
            .await;
        self.finish("expire", result).await
    }

    async fn expire_nx(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg("NX")
            .query_async::<bool>(&mut conn)
            .await;
        self.finish("expire_nx", result).await
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("TTL").arg(key).query_async::<i64>(&mut conn).await;
        self.finish("ttl", result).await.map(KeyTtl::from_reply)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<ScanPage> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async::<(u64, Vec<String>)>(&mut conn)
            .await;
        let (cursor, keys) = self.finish("scan", result).await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(key);
        }
        let result = pipe.query_async::<Vec<Option<String>>>(&mut conn).await;
        self.finish("get_many", result).await
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("PING").query_async::<String>(&mut conn).await;
        self.finish("ping", result).await.map(|_| ())
    }

    async fn server_stats(&self) -> CacheResult<ServerStats> {
        let mut conn = self.connection().await?;

        let memory = redis::cmd("INFO").arg("memory").query_async::<String>(&mut conn).await;
        let memory = self.finish("info", memory).await?;
        let server = redis::cmd("INFO").arg("server").query_async::<String>(&mut conn).await;
        let server = self.finish("info", server).await?;
        let key_count = redis::cmd("DBSIZE").query_async::<u64>(&mut conn).await;
        let key_count = self.finish("dbsize", key_count).await?;

        Ok(ServerStats {
            memory_used: info_field(&memory, "used_memory_human").map(str::to_string),
            key_count,
            uptime_secs: info_field(&server, "uptime_in_seconds").and_then(|v| v.parse().ok()),
        })
    }

    async fn flush_all(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let result = redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await;
        self.finish("flush", result).await
    }
}

/// Looks up `field` in an `INFO` reply (`name:value` lines).
fn info_field<'a>(info: &'a str, field: &str) -> Option<&'a str> {
    info.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .find(|(name, _)| *name == field)
        .map(|(_, value)| value.trim())
}
