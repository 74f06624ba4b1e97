//! Per-domain expiry rules.
//!
//! Writes always (re)set a key's TTL to `base_ttl`. Reads additionally reset
//! it when `refresh_on_read` is set, so records in those domains live as long
//! as somebody keeps reading them.

use std::time::Duration;

use crate::keys::Domain;

pub const MINUTE: Duration = Duration::from_secs(60);
pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const GENERIC_CACHE_TTL: Duration = HOUR;
pub const ARTIFACT_TTL: Duration = DAY;
pub const PROJECT_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const JOB_TTL: Duration = HOUR;
pub const PREVIEW_TTL: Duration = DAY;
/// Only used when a rate-limit caller passes a zero window.
pub const DEFAULT_RATE_WINDOW: Duration = MINUTE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub base_ttl: Duration,
    pub refresh_on_read: bool,
}

impl TtlPolicy {
    pub const fn fixed(base_ttl: Duration) -> Self {
        Self {
            base_ttl,
            refresh_on_read: false,
        }
    }

    pub const fn sliding(base_ttl: Duration) -> Self {
        Self {
            base_ttl,
            refresh_on_read: true,
        }
    }

    pub fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Session => Self::fixed(SESSION_TTL),
            Domain::RateLimit => Self::fixed(DEFAULT_RATE_WINDOW),
            Domain::GenericCache => Self::fixed(GENERIC_CACHE_TTL),
            Domain::Artifact | Domain::ArtifactList => Self::fixed(ARTIFACT_TTL),
            Domain::ProjectFiles | Domain::ProjectMeta => Self::sliding(PROJECT_TTL),
            Domain::AsyncJob => Self::fixed(JOB_TTL),
            Domain::Preview => Self::fixed(PREVIEW_TTL),
        }
    }

    /// Same refresh rule, different base. Used for caller-supplied TTLs.
    pub fn with_base(self, base_ttl: Duration) -> Self {
        Self { base_ttl, ..self }
    }

    /// TTL in whole seconds, never below one (a zero TTL would make SET EX fail).
    pub fn ttl_secs(&self) -> u64 {
        self.base_ttl.as_secs().max(1)
    }
}
