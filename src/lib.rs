//! Ephemeral-state caching and session layer.
//!
//! Sessions, rate-limit counters, generated-artifact caches, taken-over
//! project file trees and async-job records, kept in Redis with per-domain
//! expiry. When Redis is not configured every store degrades to a no-op so
//! callers fall back to the system of record.

use std::sync::Arc;

pub mod admin;
pub mod codec;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod keys;
pub mod monitoring;
pub mod rate_limit;
pub mod store;
pub mod stores;
pub mod ttl;

pub use config::CacheConfig;
pub use enumerate::{BulkEnumerator, OwnedRecord};
pub use error::{CacheError, CacheResult};
pub use keys::{build_key, Domain};
pub use rate_limit::{BackendErrorPolicy, RateLimitDecision, RateLimiter};
pub use store::{KeepAliveGuard, KvBackend, MemoryBackend, StoreHandle};
pub use stores::{
    ArtifactCache, GenericCache, JobStore, PreviewCache, ProjectStore, SessionStore,
};
pub use ttl::TtlPolicy;

/// Every store wired to one shared handle.
///
/// Built once at startup by the application and passed to request handlers.
/// When built with [`CacheServices::from_config`] it also owns the
/// connection keep-alive loop, which stops when the last clone is dropped.
#[derive(Clone)]
pub struct CacheServices {
    pub handle: StoreHandle,
    pub sessions: SessionStore,
    pub cache: GenericCache,
    pub artifacts: ArtifactCache,
    pub projects: ProjectStore,
    pub jobs: JobStore,
    pub previews: PreviewCache,
    pub rate_limiter: RateLimiter,
    keepalive: Option<Arc<KeepAliveGuard>>,
}

impl CacheServices {
    pub fn from_config(config: &CacheConfig) -> Self {
        monitoring::metrics::init();
        let handle = StoreHandle::from_config(config);
        Self::with_handle(handle)
            .with_rate_limit_policy(config.rate_limit_on_error)
            .with_keepalive()
    }

    pub fn with_handle(handle: StoreHandle) -> Self {
        Self {
            sessions: SessionStore::new(handle.clone()),
            cache: GenericCache::new(handle.clone()),
            artifacts: ArtifactCache::new(handle.clone()),
            projects: ProjectStore::new(handle.clone()),
            jobs: JobStore::new(handle.clone()),
            previews: PreviewCache::new(handle.clone()),
            rate_limiter: RateLimiter::new(handle.clone()),
            handle,
            keepalive: None,
        }
    }

    /// Starts the keep-alive PING loop for the shared handle. No-op when the
    /// handle is disabled or the loop is already running.
    pub fn with_keepalive(mut self) -> Self {
        if self.keepalive.is_none() {
            self.keepalive = self.handle.spawn_keepalive().map(Arc::new);
        }
        self
    }

    pub fn keepalive_running(&self) -> bool {
        self.keepalive.is_some()
    }

    pub fn with_rate_limit_policy(mut self, policy: BackendErrorPolicy) -> Self {
        self.rate_limiter = self.rate_limiter.with_policy(policy);
        self
    }

    pub fn is_available(&self) -> bool {
        self.handle.is_available()
    }
}
