//! Cursor-based listing of records by owner.
//!
//! Walks the keyspace with bounded `SCAN` pages (never `KEYS`), fetches each
//! page's values in one pipelined batch, then filters by owner and sorts by
//! recency in-process. Values that fail to decode are skipped.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{require_id, CacheResult};
use crate::store::{KvBackend, StoreHandle};

/// A record that belongs to an owner and carries a recency timestamp.
pub trait OwnedRecord {
    fn owner_id(&self) -> &str;
    fn recency(&self) -> DateTime<Utc>;
}

#[derive(Clone)]
pub struct BulkEnumerator {
    handle: StoreHandle,
    batch_size: usize,
}

impl BulkEnumerator {
    pub fn new(handle: StoreHandle) -> Self {
        let batch_size = handle.scan_batch_size();
        Self { handle, batch_size }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Every record matching `pattern` whose owner is `owner_id`, newest first.
    ///
    /// A failing backend yields an empty list rather than a partial one.
    pub async fn list_by_owner<T>(&self, pattern: &str, owner_id: &str) -> CacheResult<Vec<T>>
    where
        T: OwnedRecord + DeserializeOwned,
    {
        let pattern = require_id("pattern", pattern)?;
        let owner_id = require_id("owner_id", owner_id)?;
        let Some(backend) = self.handle.backend() else {
            return Ok(Vec::new());
        };

        let mut records: Vec<T> = match self.fetch_all(backend.as_ref(), pattern).await {
            Ok(records) => records,
            Err(e) => {
                warn!(pattern, error = %e, "Bulk enumeration failed");
                return Ok(Vec::new());
            }
        };

        records.retain(|r| r.owner_id() == owner_id);
        records.sort_by(|a, b| b.recency().cmp(&a.recency()));
        Ok(records)
    }

    /// Up to `limit` keys matching `pattern`, in scan order.
    pub async fn keys_matching(&self, pattern: &str, limit: usize) -> CacheResult<Vec<String>> {
        let pattern = require_id("pattern", pattern)?;
        let Some(backend) = self.handle.backend() else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let page = match backend.scan(cursor, pattern, self.batch_size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(pattern, error = %e, "Key scan failed");
                    break;
                }
            };
            for key in page.keys {
                if keys.len() >= limit {
                    return Ok(keys);
                }
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    async fn fetch_all<T: DeserializeOwned>(
        &self,
        backend: &dyn KvBackend,
        pattern: &str,
    ) -> CacheResult<Vec<T>> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut cursor = 0;
        let mut pages = 0usize;
        let mut skipped = 0usize;

        loop {
            let page = backend.scan(cursor, pattern, self.batch_size).await?;
            pages += 1;

            // SCAN may hand back a key more than once.
            let fresh: Vec<String> = page
                .keys
                .into_iter()
                .filter(|k| seen.insert(k.clone()))
                .collect();

            if !fresh.is_empty() {
                let values = backend.get_many(&fresh).await?;
                for (key, value) in fresh.iter().zip(values) {
                    // Expired between SCAN and GET.
                    let Some(raw) = value else { continue };
                    match codec::decode::<T>(key, &raw) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            skipped += 1;
                            debug!(key = %key, error = %e, "Skipping undecodable record");
                        }
                    }
                }
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern, pages, records = records.len(), skipped, "Enumeration complete");
        Ok(records)
    }
}
