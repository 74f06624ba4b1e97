// src/store/handle.rs - Shared handle to the cache backend

use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::backend::KvBackend;
use super::redis_backend::RedisBackend;
use crate::config::{CacheConfig, DEFAULT_KEEPALIVE_SECS, DEFAULT_SCAN_BATCH};

/// Process-wide handle to the cache backend.
///
/// Built once by the composition root and cloned into whatever needs it.
/// When the backend is not configured the handle is *disabled*: every store
/// built on it turns into a no-op.
#[derive(Clone)]
pub struct StoreHandle {
    backend: Option<Arc<dyn KvBackend>>,
    keepalive_interval: Duration,
    scan_batch_size: usize,
}

impl StoreHandle {
    pub fn from_config(config: &CacheConfig) -> Self {
        if !config.is_configured() {
            info!("Redis cache disabled (set REDIS_HOST and REDIS_PASSWORD to enable)");
            return Self::disabled();
        }

        match RedisBackend::new(config) {
            Ok(backend) => {
                info!("Redis cache configured for {}", config.display_addr());
                Self {
                    backend: Some(Arc::new(backend)),
                    keepalive_interval: config.keepalive_interval,
                    scan_batch_size: config.scan_batch_size,
                }
            }
            Err(e) => {
                error!("Failed to create Redis client: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            scan_batch_size: DEFAULT_SCAN_BATCH,
        }
    }

    pub fn with_backend(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::disabled()
        }
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_scan_batch_size(mut self, batch: usize) -> Self {
        self.scan_batch_size = batch.max(1);
        self
    }

    /// No I/O: reports whether a backend was configured.
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&Arc<dyn KvBackend>> {
        self.backend.as_ref()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("disabled", |b| b.name())
    }

    pub fn scan_batch_size(&self) -> usize {
        self.scan_batch_size
    }

    /// Starts a background PING loop. It stops when the guard is dropped.
    ///
    /// Returns `None` for a disabled handle, or when called outside a tokio
    /// runtime.
    pub fn spawn_keepalive(&self) -> Option<KeepAliveGuard> {
        let backend = Arc::clone(self.backend.as_ref()?);
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No tokio runtime; cache keep-alive not started");
                return None;
            }
        };
        let interval = self.keepalive_interval;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());

        runtime.spawn(async move {
            loop {
                select! {
                    _ = sleep(interval) => {}
                    _ = shutdown_rx.changed() => {
                        debug!("Keep-alive loop stopped");
                        return;
                    }
                }
                if let Err(e) = backend.ping().await {
                    warn!(error = %e, "Keep-alive ping failed");
                }
            }
        });

        Some(KeepAliveGuard { shutdown_tx })
    }
}

pub struct KeepAliveGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for KeepAliveGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
