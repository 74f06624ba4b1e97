//! Key namespace.
//!
//! Every record lives under `<prefix><identifier>`. The prefixes are part of
//! the stored-data contract and must not change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ttl::TtlPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Session,
    RateLimit,
    GenericCache,
    Artifact,
    ArtifactList,
    ProjectFiles,
    ProjectMeta,
    AsyncJob,
    Preview,
}

impl Domain {
    pub const ALL: [Domain; 9] = [
        Domain::Session,
        Domain::RateLimit,
        Domain::GenericCache,
        Domain::Artifact,
        Domain::ArtifactList,
        Domain::ProjectFiles,
        Domain::ProjectMeta,
        Domain::AsyncJob,
        Domain::Preview,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Domain::Session => "user:session:",
            Domain::RateLimit => "ratelimit:",
            Domain::GenericCache => "cache:",
            Domain::Artifact => "audit:",
            Domain::ArtifactList => "audit_list:",
            Domain::ProjectFiles => "project:files:",
            Domain::ProjectMeta => "project:meta:",
            Domain::AsyncJob => "video:job:",
            Domain::Preview => "preview:",
        }
    }

    /// Short label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Session => "session",
            Domain::RateLimit => "rate_limit",
            Domain::GenericCache => "cache",
            Domain::Artifact => "artifact",
            Domain::ArtifactList => "artifact_list",
            Domain::ProjectFiles => "project_files",
            Domain::ProjectMeta => "project_meta",
            Domain::AsyncJob => "async_job",
            Domain::Preview => "preview",
        }
    }

    /// Name of the identifier reported when a caller leaves it empty.
    pub fn id_field(&self) -> &'static str {
        match self {
            Domain::Session => "user_id",
            Domain::RateLimit => "rate_limit_key",
            Domain::GenericCache => "cache_key",
            Domain::Artifact => "artifact_id",
            Domain::ArtifactList => "owner_id",
            Domain::ProjectFiles | Domain::ProjectMeta => "project_id",
            Domain::AsyncJob => "job_id",
            Domain::Preview => "preview_id",
        }
    }

    pub fn policy(&self) -> TtlPolicy {
        TtlPolicy::for_domain(*self)
    }

    /// SCAN pattern matching every key of this domain.
    pub fn pattern(&self) -> String {
        format!("{}*", self.prefix())
    }

    /// Domain owning `key`, by longest matching prefix.
    pub fn of_key(key: &str) -> Option<Domain> {
        Self::ALL
            .iter()
            .filter(|d| key.starts_with(d.prefix()))
            .max_by_key(|d| d.prefix().len())
            .copied()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Builds `<prefix><id>`. Pure and total; identifier validation belongs to
/// the record stores.
pub fn build_key(domain: Domain, id: &str) -> String {
    format!("{}{}", domain.prefix(), id)
}

/// Strips the domain prefix, if present.
pub fn identifier_of(domain: Domain, key: &str) -> Option<&str> {
    key.strip_prefix(domain.prefix())
}
