//! Administrative operations: health check, flush, pattern clear and key
//! inspection.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::enumerate::BulkEnumerator;
use crate::error::{require_id, CacheResult};
use crate::keys::{identifier_of, Domain};
use crate::store::{KeyTtl, StoreHandle};

const PREVIEW_CHARS: usize = 100;

/// Patterns cleared when none are given: derived project, preview and
/// generic cache state. Sessions and rate-limit counters are left alone.
pub const DEFAULT_CLEAR_PATTERNS: [&str; 3] = ["project:*", "preview:*", "cache:*"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub connected: bool,
    pub backend: String,
    pub memory_used: Option<String>,
    pub key_count: Option<u64>,
    pub uptime_secs: Option<u64>,
}

/// PING plus server figures. Never fails; a broken or missing backend is
/// reported as `connected: false`.
pub async fn health_report(handle: &StoreHandle) -> HealthReport {
    let mut report = HealthReport {
        connected: false,
        backend: handle.backend_name().to_string(),
        memory_used: None,
        key_count: None,
        uptime_secs: None,
    };

    let Some(backend) = handle.backend() else {
        return report;
    };

    if let Err(e) = backend.ping().await {
        warn!(error = %e, "Cache health check failed");
        return report;
    }
    report.connected = true;

    match backend.server_stats().await {
        Ok(stats) => {
            report.memory_used = stats.memory_used;
            report.key_count = Some(stats.key_count);
            report.uptime_secs = stats.uptime_secs;
        }
        Err(e) => warn!(error = %e, "Failed to read cache server stats"),
    }
    report
}

/// Deletes every key in the store. Returns false when nothing was flushed.
pub async fn flush_all(handle: &StoreHandle) -> bool {
    let Some(backend) = handle.backend() else {
        return false;
    };
    match backend.flush_all().await {
        Ok(()) => {
            info!("Cache flushed");
            true
        }
        Err(e) => {
            error!("Failed to flush cache: {}", e);
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub dry_run: bool,
    pub patterns: Vec<String>,
    /// Distinct keys matched across all patterns.
    pub matched: usize,
    pub deleted: u64,
}

/// Deletes every key matching any of `patterns`.
///
/// Keys are collected with cursor scans first and then removed in DEL
/// batches of the scan batch size. With `dry_run` only the match count is
/// reported. A failing DEL batch stops the run; the report carries what was
/// deleted up to then.
pub async fn clear_patterns<S: AsRef<str>>(
    handle: &StoreHandle,
    patterns: &[S],
    dry_run: bool,
) -> CacheResult<ClearReport> {
    let patterns = patterns
        .iter()
        .map(|p| require_id("pattern", p.as_ref()).map(str::to_string))
        .collect::<CacheResult<Vec<_>>>()?;
    let mut report = ClearReport {
        dry_run,
        patterns,
        matched: 0,
        deleted: 0,
    };
    let Some(backend) = handle.backend() else {
        return Ok(report);
    };

    let enumerator = BulkEnumerator::new(handle.clone());
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for pattern in &report.patterns {
        for key in enumerator.keys_matching(pattern, usize::MAX).await? {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    report.matched = keys.len();

    if dry_run {
        info!(patterns = ?report.patterns, matched = report.matched, "Dry run; nothing deleted");
        return Ok(report);
    }

    for batch in keys.chunks(enumerator.batch_size()) {
        match backend.delete(batch).await {
            Ok(removed) => report.deleted += removed,
            Err(e) => {
                error!(error = %e, deleted = report.deleted, "Pattern clear aborted");
                break;
            }
        }
    }
    info!(patterns = ?report.patterns, deleted = report.deleted, "Cleared cache keys");
    Ok(report)
}

/// What a stored value looks like, without decoding it into a domain type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadShape {
    /// JSON object; `missing_id` flags objects without an `id` field.
    Object { fields: Vec<String>, missing_id: bool },
    /// Valid JSON that is not an object.
    Json,
    /// Not JSON at all.
    Text { preview: String, truncated: bool },
}

impl PayloadShape {
    pub fn of(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => PayloadShape::Object {
                missing_id: !map.contains_key("id"),
                fields: map.keys().cloned().collect(),
            },
            Ok(_) => PayloadShape::Json,
            Err(_) => {
                let truncated = raw.chars().count() > PREVIEW_CHARS;
                PayloadShape::Text {
                    preview: raw.chars().take(PREVIEW_CHARS).collect(),
                    truncated,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInspection {
    pub key: String,
    pub domain: Option<Domain>,
    /// Key with its domain prefix stripped.
    pub id: Option<String>,
    pub ttl: KeyTtl,
    pub shape: PayloadShape,
}

/// TTL and payload shape of a single key. `None` when the key does not
/// exist or the backend is unavailable.
pub async fn inspect_key(handle: &StoreHandle, key: &str) -> CacheResult<Option<KeyInspection>> {
    let key = require_id("key", key)?;
    let Some(backend) = handle.backend() else {
        return Ok(None);
    };

    let raw = match backend.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ok(None),
        Err(e) => {
            warn!(key, error = %e, "Failed to read key for inspection");
            return Ok(None);
        }
    };
    let ttl = match backend.ttl(key).await {
        Ok(ttl) => ttl,
        Err(e) => {
            warn!(key, error = %e, "Failed to read TTL for inspection");
            return Ok(None);
        }
    };

    let domain = Domain::of_key(key);
    Ok(Some(KeyInspection {
        key: key.to_string(),
        domain,
        id: domain.and_then(|d| identifier_of(d, key)).map(str::to_string),
        ttl,
        shape: PayloadShape::of(&raw),
    }))
}

/// Inspects up to `limit` keys matching `pattern`, walking the keyspace with
/// a cursor scan.
pub async fn inspect_pattern(
    handle: &StoreHandle,
    pattern: &str,
    limit: usize,
) -> CacheResult<Vec<KeyInspection>> {
    let keys = BulkEnumerator::new(handle.clone())
        .keys_matching(pattern, limit)
        .await?;

    let mut inspections = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(inspection) = inspect_key(handle, &key).await? {
            inspections.push(inspection);
        }
    }
    Ok(inspections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvBackend, MemoryBackend};
    use std::sync::Arc;
    use std::time::Duration;

    fn handle() -> (StoreHandle, MemoryBackend) {
        let backend = MemoryBackend::new();
        (StoreHandle::with_backend(Arc::new(backend.clone())), backend)
    }

    #[tokio::test]
    async fn test_health_report_for_disabled_backend() {
        let report = health_report(&StoreHandle::disabled()).await;
        assert!(!report.connected);
        assert_eq!(report.backend, "disabled");
        assert!(report.key_count.is_none());
    }

    #[tokio::test]
    async fn test_health_report_counts_keys() {
        let (handle, backend) = handle();
        backend.insert_raw("a", "1");
        backend.insert_raw("b", "2");
        let report = health_report(&handle).await;
        assert!(report.connected);
        assert_eq!(report.key_count, Some(2));
        assert!(report.memory_used.is_some());
    }

    #[tokio::test]
    async fn test_health_report_when_backend_down() {
        let (handle, backend) = handle();
        backend.set_failing(true);
        assert!(!health_report(&handle).await.connected);
    }

    #[tokio::test]
    async fn test_flush_all() {
        let (handle, backend) = handle();
        backend.insert_raw("a", "1");
        assert!(flush_all(&handle).await);
        assert!(backend.is_empty());
        assert!(!flush_all(&StoreHandle::disabled()).await);
    }

    #[tokio::test]
    async fn test_inspect_unknown_prefix_has_no_id() {
        let (handle, backend) = handle();
        backend.insert_raw("legacy:thing", "1");
        let found = inspect_key(&handle, "legacy:thing").await.unwrap().unwrap();
        assert_eq!(found.domain, None);
        assert_eq!(found.id, None);
    }

    fn seed_mixed(backend: &MemoryBackend) {
        for i in 0..12 {
            backend.insert_raw(&format!("project:meta:p{i}"), "{}");
            backend.insert_raw(&format!("project:files:p{i}"), "[]");
        }
        backend.insert_raw("preview:s1", "\"<html/>\"");
        backend.insert_raw("cache:k", "1");
        backend.insert_raw("user:session:u1", "{}");
        backend.insert_raw("ratelimit:ip:1", "3");
    }

    #[tokio::test]
    async fn test_clear_patterns_dry_run_deletes_nothing() {
        let (handle, backend) = handle();
        seed_mixed(&backend);

        let report = clear_patterns(&handle, &DEFAULT_CLEAR_PATTERNS, true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.matched, 26);
        assert_eq!(report.deleted, 0);
        assert_eq!(backend.len(), 28);
    }

    #[tokio::test]
    async fn test_clear_patterns_spares_sessions_and_counters() {
        let (handle, backend) = handle();
        let handle = handle.with_scan_batch_size(5);
        seed_mixed(&backend);

        let report = clear_patterns(&handle, &DEFAULT_CLEAR_PATTERNS, false).await.unwrap();
        assert_eq!(report.matched, 26);
        assert_eq!(report.deleted, 26);
        assert_eq!(backend.len(), 2);
        assert!(backend.contains("user:session:u1"));
        assert!(backend.contains("ratelimit:ip:1"));
        assert!(backend.scan_counts().iter().all(|&count| count == 5));
    }

    #[tokio::test]
    async fn test_clear_patterns_counts_overlaps_once() {
        let (handle, backend) = handle();
        seed_mixed(&backend);

        let report = clear_patterns(&handle, &["project:meta:*", "project:*"], false)
            .await
            .unwrap();
        assert_eq!(report.matched, 24);
        assert_eq!(report.deleted, 24);
    }

    #[tokio::test]
    async fn test_clear_patterns_edge_cases() {
        let report = clear_patterns(&StoreHandle::disabled(), &["cache:*"], false)
            .await
            .unwrap();
        assert_eq!((report.matched, report.deleted), (0, 0));

        let (handle, _) = handle();
        let err = clear_patterns(&handle, &["cache:*", " "], true).await.unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_payload_shapes() {
        assert_eq!(
            PayloadShape::of(r#"{"id":"x","name":"y"}"#),
            PayloadShape::Object {
                fields: vec!["id".into(), "name".into()],
                missing_id: false
            }
        );
        assert!(matches!(
            PayloadShape::of(r#"{"name":"y"}"#),
            PayloadShape::Object { missing_id: true, .. }
        ));
        assert_eq!(PayloadShape::of("[1,2]"), PayloadShape::Json);

        let long = "x".repeat(150);
        match PayloadShape::of(&long) {
            PayloadShape::Text { preview, truncated } => {
                assert_eq!(preview.len(), 100);
                assert!(truncated);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inspect_pattern_reports_ttl_and_domain() {
        let (handle, backend) = handle();
        backend
            .set_ex("user:session:u1", r#"{"userId":"u1"}"#, Duration::from_secs(60))
            .await
            .unwrap();
        backend.insert_raw("user:session:u2", "plain");
        backend.insert_raw("cache:other", "1");

        let found = inspect_pattern(&handle, "user:session:*", 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].ttl, KeyTtl::Expires(60));
        assert_eq!(found[0].domain, Some(Domain::Session));
        assert_eq!(found[0].id.as_deref(), Some("u1"));
        assert_eq!(found[1].ttl, KeyTtl::Persistent);
        assert!(matches!(found[1].shape, PayloadShape::Text { .. }));
    }
}
