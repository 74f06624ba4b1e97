//! Key-value primitives the cache layer is built on.
//!
//! [`RedisBackend`](super::RedisBackend) is the production implementation;
//! [`MemoryBackend`](super::MemoryBackend) mirrors its semantics in-process
//! for tests and local development.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

/// Remaining lifetime of a key, as reported by `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "secs", rename_all = "snake_case")]
pub enum KeyTtl {
    /// Key does not exist (`-2`).
    Missing,
    /// Key exists without expiry (`-1`).
    Persistent,
    Expires(u64),
}

impl KeyTtl {
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -2 => KeyTtl::Missing,
            r if r < 0 => KeyTtl::Persistent,
            r => KeyTtl::Expires(r as u64),
        }
    }

    pub fn secs(&self) -> Option<u64> {
        match self {
            KeyTtl::Expires(secs) => Some(*secs),
            _ => None,
        }
    }
}

/// One page of a cursor scan. A `cursor` of 0 means iteration is complete.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Server-side figures for the health check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerStats {
    pub memory_used: Option<String>,
    pub key_count: u64,
    pub uptime_secs: Option<u64>,
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// `SET key value EX ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Returns the number of keys removed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Atomic increment; returns the post-increment value.
    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// `EXPIRE key ttl NX`: sets the expiry only if the key has none.
    /// Returns false when the key is missing or already expires.
    async fn expire_nx(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl>;

    /// One bounded `SCAN cursor MATCH pattern COUNT count` step.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<ScanPage>;

    /// Pipelined GETs: one round trip, results in key order.
    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>>;

    async fn ping(&self) -> CacheResult<()>;

    async fn server_stats(&self) -> CacheResult<ServerStats>;

    /// Removes every key in the selected database.
    async fn flush_all(&self) -> CacheResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_reply_mapping() {
        assert_eq!(KeyTtl::from_reply(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::from_reply(-1), KeyTtl::Persistent);
        assert_eq!(KeyTtl::from_reply(42), KeyTtl::Expires(42));
        assert_eq!(KeyTtl::from_reply(0).secs(), Some(0));
        assert_eq!(KeyTtl::Persistent.secs(), None);
    }
}
