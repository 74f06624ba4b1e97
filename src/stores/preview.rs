// src/stores/preview.rs - Rendered previews (preview:<id>, 24h, fixed)

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CacheResult;
use crate::keys::Domain;
use crate::store::StoreHandle;

use super::record::RecordStore;

#[derive(Clone)]
pub struct PreviewCache {
    records: RecordStore,
}

impl PreviewCache {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            records: RecordStore::new(handle, Domain::Preview),
        }
    }

    pub async fn save<T: Serialize + ?Sized>(&self, preview_id: &str, payload: &T) -> CacheResult<bool> {
        self.records.save(preview_id, payload).await
    }

    pub async fn load<T: DeserializeOwned>(&self, preview_id: &str) -> CacheResult<Option<T>> {
        self.records.load(preview_id).await
    }

    pub async fn delete(&self, preview_id: &str) -> CacheResult<bool> {
        self.records.delete(preview_id).await
    }
}
