// src/stores/generic.rs - General purpose cache (cache:<key>, default 1h)

use std::future::Future;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CacheResult;
use crate::keys::Domain;
use crate::store::StoreHandle;

use super::record::RecordStore;

#[derive(Clone)]
pub struct GenericCache {
    records: RecordStore,
}

impl GenericCache {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            records: RecordStore::new(handle, Domain::GenericCache),
        }
    }

    /// Stores `value` for `ttl`, or for the domain default (1h) when `None`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let ttl = ttl.unwrap_or(self.records.policy().base_ttl);
        self.records.save_with_ttl(key, value, ttl).await
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        self.records.load(key).await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.records.delete(key).await
    }

    /// Read-through: returns the cached value, or runs `compute` and caches
    /// its result. Errors from `compute` are returned as-is and nothing is
    /// cached.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<crate::error::CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await? {
            return Ok(hit);
        }
        let value = compute().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }
}
