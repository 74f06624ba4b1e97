//! In-process [`KvBackend`] with Redis semantics.
//!
//! Used by the test suite and for local development without a Redis
//! instance. Expiry uses [`tokio::time::Instant`], so tests running on a
//! paused clock can move time forward with `tokio::time::advance`.
//!
//! Besides storage it records how the scan primitive was driven and can be
//! told to fail every operation, which is how backend outages are simulated.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use tokio::time::Instant;

use super::backend::{KeyTtl, KvBackend, ScanPage, ServerStats};
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
struct Instrumentation {
    scan_counts: Mutex<Vec<usize>>,
    get_many_calls: AtomicUsize,
    ping_calls: AtomicUsize,
    failing: AtomicBool,
}

/// Cheaply cloneable; clones share the same data.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<Mutex<BTreeMap<String, Entry>>>,
    stats: Arc<Instrumentation>,
    started: Instant,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(BTreeMap::new())),
            stats: Arc::new(Instrumentation::default()),
            started: Instant::now(),
        }
    }

    /// Makes every subsequent operation fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.stats.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `scan` calls so far.
    pub fn scan_calls(&self) -> usize {
        self.stats.scan_counts.lock().len()
    }

    /// The COUNT hint passed to each `scan` call, in order.
    pub fn scan_counts(&self) -> Vec<usize> {
        self.stats.scan_counts.lock().clone()
    }

    pub fn get_many_calls(&self) -> usize {
        self.stats.get_many_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> usize {
        self.stats.ping_calls.load(Ordering::SeqCst)
    }

    /// Writes a raw value with no expiry, bypassing any encoding.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.data.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    /// Whether `key` currently exists (expired keys do not).
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.data.lock().get(key).is_some_and(|e| e.is_live(now))
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failing(&self, op: &str) -> CacheResult<()> {
        if self.stats.failing.load(Ordering::SeqCst) {
            Err(CacheError::Backend(format!("injected failure during {op}")))
        } else {
            Ok(())
        }
    }

    fn live_value(data: &mut BTreeMap<String, Entry>, key: &str, now: Instant) -> Option<String> {
        match data.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                data.remove(key);
                None
            }
            None => None,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates a Redis glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| CacheError::Backend(format!("invalid pattern {pattern}: {e}")))
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check_failing("get")?;
        let now = Instant::now();
        Ok(Self::live_value(&mut self.data.lock(), key, now))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.check_failing("set_ex")?;
        let ttl = ttl.max(Duration::from_secs(1));
        self.data.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.check_failing("delete")?;
        let now = Instant::now();
        let mut data = self.data.lock();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = data.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.check_failing("incr")?;
        let now = Instant::now();
        let mut data = self.data.lock();
        let current = Self::live_value(&mut data, key, now);
        let next = match current {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| CacheError::Backend("value is not an integer".to_string()))?
                + 1,
            None => 1,
        };
        // INCR keeps an existing expiry and creates new keys without one.
        let expires_at = data.get(key).and_then(|e| e.expires_at);
        data.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.check_failing("expire")?;
        let now = Instant::now();
        let mut data = self.data.lock();
        match data.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl.max(Duration::from_secs(1)));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_nx(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.check_failing("expire_nx")?;
        let now = Instant::now();
        let mut data = self.data.lock();
        match data.get_mut(key) {
            Some(entry) if entry.is_live(now) && entry.expires_at.is_none() => {
                entry.expires_at = Some(now + ttl.max(Duration::from_secs(1)));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        self.check_failing("ttl")?;
        let now = Instant::now();
        let data = self.data.lock();
        Ok(match data.get(key) {
            Some(entry) if entry.is_live(now) => match entry.expires_at {
                Some(at) => {
                    let remaining = at.duration_since(now);
                    KeyTtl::Expires(((remaining.as_millis() + 500) / 1000) as u64)
                }
                None => KeyTtl::Persistent,
            },
            _ => KeyTtl::Missing,
        })
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<ScanPage> {
        self.check_failing("scan")?;
        self.stats.scan_counts.lock().push(count);

        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        let data = self.data.lock();
        let live: Vec<&String> = data
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k)
            .collect();

        let start = (cursor as usize).min(live.len());
        let end = (start + count.max(1)).min(live.len());
        let keys = live[start..end]
            .iter()
            .filter(|k| matcher.is_match(k))
            .map(|k| k.to_string())
            .collect();
        let next = if end >= live.len() { 0 } else { end as u64 };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        self.check_failing("get_many")?;
        self.stats.get_many_calls.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let mut data = self.data.lock();
        Ok(keys
            .iter()
            .map(|key| Self::live_value(&mut data, key, now))
            .collect())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.stats.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing("ping")
    }

    async fn server_stats(&self) -> CacheResult<ServerStats> {
        self.check_failing("server_stats")?;
        let now = Instant::now();
        let data = self.data.lock();
        let live = data.iter().filter(|(_, e)| e.is_live(now));
        let (count, bytes) = live.fold((0u64, 0usize), |(n, b), (k, e)| (n + 1, b + k.len() + e.value.len()));
        Ok(ServerStats {
            memory_used: Some(format!("{}B", bytes)),
            key_count: count,
            uptime_secs: Some(now.duration_since(self.started).as_secs()),
        })
    }

    async fn flush_all(&self) -> CacheResult<()> {
        self.check_failing("flush")?;
        self.data.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_translation() {
        let re = glob_to_regex("project:meta:*").unwrap();
        assert!(re.is_match("project:meta:p1"));
        assert!(!re.is_match("project:files:p1"));
        assert!(glob_to_regex("a?c").unwrap().is_match("abc"));
        assert!(glob_to_regex("a.c").unwrap().is_match("a.c"));
        assert!(!glob_to_regex("a.c").unwrap().is_match("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_expires() {
        let backend = MemoryBackend::new();
        backend.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(backend.ttl("k").await.unwrap(), KeyTtl::Expires(10));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert_eq!(backend.ttl("k").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_nx_never_resets_an_existing_expiry() {
        let backend = MemoryBackend::new();
        backend.set_ex("k", "v", Duration::from_secs(30)).await.unwrap();
        assert!(!backend.expire_nx("k", Duration::from_secs(60)).await.unwrap());
        assert_eq!(backend.ttl("k").await.unwrap(), KeyTtl::Expires(30));

        backend.insert_raw("p", "1");
        assert!(backend.expire_nx("p", Duration::from_secs(60)).await.unwrap());
        assert_eq!(backend.ttl("p").await.unwrap(), KeyTtl::Expires(60));
        assert!(!backend.expire_nx("missing", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_creates_persistent_key() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.incr("c").await.unwrap(), 1);
        assert_eq!(backend.incr("c").await.unwrap(), 2);
        assert_eq!(backend.ttl("c").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let backend = MemoryBackend::new();
        backend.insert_raw("c", "{}");
        assert!(backend.incr("c").await.is_err());
    }

    #[tokio::test]
    async fn test_scan_pages_until_cursor_zero() {
        let backend = MemoryBackend::new();
        for i in 0..25 {
            backend.insert_raw(&format!("a:{i:02}"), "1");
            backend.insert_raw(&format!("b:{i:02}"), "1");
        }

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = backend.scan(cursor, "a:*", 10).await.unwrap();
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 25);
        assert_eq!(backend.scan_calls(), 5);
        assert!(backend.scan_counts().iter().all(|c| *c == 10));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);
        assert!(backend.get("k").await.is_err());
        backend.set_failing(false);
        assert!(backend.get("k").await.is_ok());
    }
}
