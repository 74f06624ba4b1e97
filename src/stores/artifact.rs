//! Generated-artifact (audit) cache.
//!
//! Single artifacts live under `audit:<artifactId>`; each owner also has an
//! aggregate list under `audit_list:<ownerId>`. Any write or delete of an
//! artifact drops the owner's list so the next list read rebuilds it from
//! the system of record instead of serving a list without the new item.

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{require_id, CacheResult};
use crate::keys::Domain;
use crate::store::StoreHandle;

use super::record::RecordStore;

#[derive(Clone)]
pub struct ArtifactCache {
    artifacts: RecordStore,
    lists: RecordStore,
}

impl ArtifactCache {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            artifacts: RecordStore::new(handle.clone(), Domain::Artifact),
            lists: RecordStore::new(handle, Domain::ArtifactList),
        }
    }

    /// Caches one artifact and invalidates the owner's list.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        artifact_id: &str,
        owner_id: &str,
        payload: &T,
    ) -> CacheResult<bool> {
        require_id(Domain::ArtifactList.id_field(), owner_id)?;
        let written = self.artifacts.save(artifact_id, payload).await?;
        self.invalidate_list(owner_id).await?;
        Ok(written)
    }

    pub async fn load<T: DeserializeOwned>(&self, artifact_id: &str) -> CacheResult<Option<T>> {
        self.artifacts.load(artifact_id).await
    }

    pub async fn delete(&self, artifact_id: &str, owner_id: &str) -> CacheResult<bool> {
        require_id(Domain::ArtifactList.id_field(), owner_id)?;
        let removed = self.artifacts.delete(artifact_id).await?;
        self.invalidate_list(owner_id).await?;
        Ok(removed)
    }

    pub async fn save_list<T: Serialize>(&self, owner_id: &str, list: &[T]) -> CacheResult<bool> {
        self.lists.save(owner_id, list).await
    }

    pub async fn load_list<T: DeserializeOwned>(&self, owner_id: &str) -> CacheResult<Option<Vec<T>>> {
        self.lists.load(owner_id).await
    }

    pub async fn invalidate_list(&self, owner_id: &str) -> CacheResult<bool> {
        let removed = self.lists.delete(owner_id).await?;
        if removed {
            debug!(owner_id, "Invalidated artifact list cache");
        }
        Ok(removed)
    }
}
