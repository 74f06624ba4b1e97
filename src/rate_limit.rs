//! Fixed-window rate limiting on atomic backend counters.
//!
//! Each check increments `ratelimit:<key>`. The increment that creates the
//! key also sets its expiry to the window length; later increments never
//! touch the expiry, so the window closes at a fixed time after the first
//! hit no matter how many requests arrive.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{require_id, CacheResult};
use crate::keys::{build_key, Domain};
use crate::monitoring::metrics::{RATE_LIMIT_FAIL_OPEN_TOTAL, RATE_LIMIT_REJECTIONS_TOTAL};
use crate::store::{KeyTtl, KvBackend, StoreHandle};
use crate::ttl::DEFAULT_RATE_WINDOW;

/// What to answer when the backend fails mid-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendErrorPolicy {
    /// Fail open: a broken cache must not block unrelated traffic.
    #[default]
    Allow,
    Deny,
}

impl FromStr for BackendErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(BackendErrorPolicy::Allow),
            "deny" => Ok(BackendErrorPolicy::Deny),
            other => Err(format!("Unknown backend error policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_in_seconds: u64,
}

#[derive(Clone)]
pub struct RateLimiter {
    handle: StoreHandle,
    on_backend_error: BackendErrorPolicy,
}

impl RateLimiter {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            handle,
            on_backend_error: BackendErrorPolicy::Allow,
        }
    }

    pub fn with_policy(mut self, policy: BackendErrorPolicy) -> Self {
        self.on_backend_error = policy;
        self
    }

    pub fn policy(&self) -> BackendErrorPolicy {
        self.on_backend_error
    }

    /// Counts one request against `key` and decides whether it may proceed.
    ///
    /// An unconfigured backend always allows. A failing backend answers
    /// according to the configured [`BackendErrorPolicy`]. Only an empty
    /// `key` is an error.
    pub async fn check(
        &self,
        key: &str,
        max_requests: u64,
        window: Duration,
    ) -> CacheResult<RateLimitDecision> {
        let key = require_id(Domain::RateLimit.id_field(), key)?;
        let window = if window.is_zero() { DEFAULT_RATE_WINDOW } else { window };

        let Some(backend) = self.handle.backend() else {
            return Ok(RateLimitDecision {
                allowed: true,
                remaining: max_requests,
                reset_in_seconds: window.as_secs(),
            });
        };

        let redis_key = build_key(Domain::RateLimit, key);
        match count_hit(backend.as_ref(), &redis_key, window).await {
            Ok((count, reset_in_seconds)) => {
                let allowed = count <= max_requests;
                if !allowed {
                    RATE_LIMIT_REJECTIONS_TOTAL.inc();
                    debug!(key = %redis_key, count, max_requests, "Rate limit exceeded");
                }
                Ok(RateLimitDecision {
                    allowed,
                    remaining: max_requests.saturating_sub(count),
                    reset_in_seconds,
                })
            }
            Err(e) => {
                warn!(key = %redis_key, error = %e, policy = ?self.on_backend_error, "Rate limit check failed");
                Ok(self.on_error(max_requests, window))
            }
        }
    }

    /// Drops the counter for `key`, opening a fresh window on the next hit.
    pub async fn reset(&self, key: &str) -> CacheResult<bool> {
        let key = require_id(Domain::RateLimit.id_field(), key)?;
        let Some(backend) = self.handle.backend() else {
            return Ok(false);
        };
        match backend.delete(&[build_key(Domain::RateLimit, key)]).await {
            Ok(removed) => Ok(removed > 0),
            Err(e) => {
                warn!(error = %e, "Failed to reset rate limit counter");
                Ok(false)
            }
        }
    }

    fn on_error(&self, max_requests: u64, window: Duration) -> RateLimitDecision {
        match self.on_backend_error {
            BackendErrorPolicy::Allow => {
                RATE_LIMIT_FAIL_OPEN_TOTAL.inc();
                RateLimitDecision {
                    allowed: true,
                    remaining: max_requests,
                    reset_in_seconds: window.as_secs(),
                }
            }
            BackendErrorPolicy::Deny => RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in_seconds: window.as_secs(),
            },
        }
    }
}

/// INCR, set the expiry if this hit created the key, then read the TTL back.
///
/// Expiry is only ever set with NX, so once a window is running no later
/// hit can move its end.
async fn count_hit(backend: &dyn KvBackend, key: &str, window: Duration) -> CacheResult<(u64, u64)> {
    let count = backend.incr(key).await?;
    if count == 1 {
        backend.expire_nx(key, window).await?;
    }

    let reset_in_seconds = match backend.ttl(key).await? {
        KeyTtl::Expires(secs) => secs,
        KeyTtl::Persistent => {
            // Creator not done yet, or it died between INCR and EXPIRE.
            if backend.expire_nx(key, window).await? {
                warn!(key, "Rate limit counter had no expiry; setting window");
            }
            window.as_secs()
        }
        KeyTtl::Missing => window.as_secs(),
    };

    Ok((count.max(0) as u64, reset_in_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("allow".parse::<BackendErrorPolicy>().unwrap(), BackendErrorPolicy::Allow);
        assert_eq!(" DENY ".parse::<BackendErrorPolicy>().unwrap(), BackendErrorPolicy::Deny);
        assert!("maybe".parse::<BackendErrorPolicy>().is_err());
        assert_eq!(BackendErrorPolicy::default(), BackendErrorPolicy::Allow);
    }

    #[tokio::test]
    async fn test_disabled_backend_always_allows() {
        let limiter = RateLimiter::new(StoreHandle::disabled()).with_policy(BackendErrorPolicy::Deny);
        for _ in 0..10 {
            let decision = limiter.check("ip:1.2.3.4", 3, Duration::from_secs(60)).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 3);
            assert_eq!(decision.reset_in_seconds, 60);
        }
    }

    #[tokio::test]
    async fn test_empty_key_is_caller_error() {
        let limiter = RateLimiter::new(StoreHandle::disabled());
        let err = limiter.check("", 3, Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_caller_error());
    }
}
