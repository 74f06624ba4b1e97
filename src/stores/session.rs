// src/stores/session.rs - User sessions (user:session:<userId>, 7 days, fixed)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::keys::Domain;
use crate::store::StoreHandle;

use super::record::RecordStore;

/// Cached identity plus the entitlement counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, credits: i64) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            name: None,
            credits,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    records: RecordStore,
}

impl SessionStore {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            records: RecordStore::new(handle, Domain::Session),
        }
    }

    /// Stores the session under its user id (login).
    pub async fn save(&self, session: &SessionRecord) -> CacheResult<bool> {
        self.records.save(&session.user_id, session).await
    }

    pub async fn load(&self, user_id: &str) -> CacheResult<Option<SessionRecord>> {
        self.records.load(user_id).await
    }

    /// Logout or invalidation.
    pub async fn delete(&self, user_id: &str) -> CacheResult<bool> {
        self.records.delete(user_id).await
    }

    /// Rewrites the cached credit balance. Returns false when there is no
    /// cached session to update.
    pub async fn update_credits(&self, user_id: &str, credits: i64) -> CacheResult<bool> {
        let Some(mut session) = self.load(user_id).await? else {
            return Ok(false);
        };
        session.credits = credits;
        self.records.save(user_id, &session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyTtl, KvBackend, MemoryBackend};
    use std::sync::Arc;
    use std::time::Duration;

    fn sessions() -> (SessionStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = SessionStore::new(StoreHandle::with_backend(Arc::new(backend.clone())));
        (store, backend)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (store, backend) = sessions();
        let session = SessionRecord::new("u1", "a@example.com", 5);

        assert!(store.save(&session).await.unwrap());
        assert_eq!(store.load("u1").await.unwrap(), Some(session));
        assert_eq!(backend.ttl("user:session:u1").await.unwrap(), KeyTtl::Expires(604_800));

        assert!(store.delete("u1").await.unwrap());
        assert_eq!(store.load("u1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_credits_rewrites_in_place() {
        let (store, backend) = sessions();
        store.save(&SessionRecord::new("u1", "a@example.com", 5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;

        assert!(store.update_credits("u1", 2).await.unwrap());
        assert_eq!(store.load("u1").await.unwrap().unwrap().credits, 2);
        // Writes always reset to the full base TTL.
        assert_eq!(backend.ttl("user:session:u1").await.unwrap(), KeyTtl::Expires(604_800));
    }

    #[tokio::test]
    async fn test_update_credits_without_session() {
        let (store, _) = sessions();
        assert!(!store.update_credits("ghost", 10).await.unwrap());
    }

    #[test]
    fn test_wire_format() {
        let raw = r#"{"userId":"u1","email":"a@b.se","credits":3,"createdAt":"2025-01-01T00:00:00Z"}"#;
        let session: SessionRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.name, None);
    }
}
