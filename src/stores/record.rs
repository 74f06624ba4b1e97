//! Shared get/set/delete plumbing for the domain stores.
//!
//! Applies the domain's TTL policy, decodes through the codec, deletes values
//! that fail to decode, and turns backend failures into miss / no-op results.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::codec;
use crate::error::{require_id, CacheResult};
use crate::keys::{build_key, Domain};
use crate::monitoring::metrics;
use crate::store::{KvBackend, StoreHandle};
use crate::ttl::TtlPolicy;

#[derive(Clone)]
pub struct RecordStore {
    handle: StoreHandle,
    domain: Domain,
    policy: TtlPolicy,
}

impl RecordStore {
    pub fn new(handle: StoreHandle, domain: Domain) -> Self {
        Self {
            handle,
            domain,
            policy: domain.policy(),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn policy(&self) -> TtlPolicy {
        self.policy
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn key(&self, id: &str) -> String {
        build_key(self.domain, id)
    }

    pub async fn load<T: DeserializeOwned>(&self, id: &str) -> CacheResult<Option<T>> {
        let id = require_id(self.domain.id_field(), id)?;
        let Some(backend) = self.handle.backend() else {
            return Ok(None);
        };
        Ok(self.load_key(backend.as_ref(), &self.key(id)).await)
    }

    pub async fn save<T: Serialize + ?Sized>(&self, id: &str, payload: &T) -> CacheResult<bool> {
        self.save_with_ttl(id, payload, self.policy.base_ttl).await
    }

    pub async fn save_with_ttl<T: Serialize + ?Sized>(
        &self,
        id: &str,
        payload: &T,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let id = require_id(self.domain.id_field(), id)?;
        let Some(backend) = self.handle.backend() else {
            return Ok(false);
        };

        let key = self.key(id);
        let raw = match codec::encode(payload) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to encode cache payload");
                return Ok(false);
            }
        };

        let ttl = self.policy.with_base(ttl);
        match backend.set_ex(&key, &raw, Duration::from_secs(ttl.ttl_secs())).await {
            Ok(()) => {
                debug!(key = %key, ttl_secs = ttl.ttl_secs(), "Cache write");
                Ok(true)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed");
                Ok(false)
            }
        }
    }

    /// Returns true when a key was actually removed.
    pub async fn delete(&self, id: &str) -> CacheResult<bool> {
        let id = require_id(self.domain.id_field(), id)?;
        let Some(backend) = self.handle.backend() else {
            return Ok(false);
        };
        let key = self.key(id);
        match backend.delete(std::slice::from_ref(&key)).await {
            Ok(removed) => Ok(removed > 0),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache delete failed");
                Ok(false)
            }
        }
    }

    async fn load_key<T: DeserializeOwned>(&self, backend: &dyn KvBackend, key: &str) -> Option<T> {
        let label = self.domain.label();
        let raw = match backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                metrics::record_miss(label);
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Cache read failed; treating as miss");
                metrics::record_miss(label);
                return None;
            }
        };

        match codec::decode::<T>(key, &raw) {
            Ok(value) => {
                if self.policy.refresh_on_read {
                    if let Err(e) = backend.expire(key, self.policy.base_ttl).await {
                        warn!(key, error = %e, "Failed to refresh TTL on read");
                    }
                }
                metrics::record_hit(label);
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Deleting corrupted cache value");
                metrics::record_corruption(label);
                metrics::record_miss(label);
                if let Err(e) = backend.delete(&[key.to_string()]).await {
                    warn!(key, error = %e, "Failed to delete corrupted cache value");
                }
                None
            }
        }
    }
}
