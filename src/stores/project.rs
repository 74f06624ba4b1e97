//! "Taken-over" project file trees.
//!
//! Two records per project, both on a 365-day TTL that every read resets:
//! the ordered file list at `project:files:<id>` and a metadata record at
//! `project:meta:<id>`. Actively edited projects therefore never expire while
//! dormant ones eventually do.
//!
//! Single-file changes are read-modify-write over the whole list. Two
//! concurrent updates to the same project can interleave and one of them can
//! be lost; nothing here locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::enumerate::{BulkEnumerator, OwnedRecord};
use crate::error::{require_id, CacheResult};
use crate::keys::Domain;
use crate::store::StoreHandle;

use super::record::RecordStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
    pub last_modified: DateTime<Utc>,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            last_modified: Utc::now(),
        }
    }
}

/// Where the project's file tree lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// In this cache, under `project:files:<id>`.
    Redis,
    /// In external blob storage; only metadata is cached here.
    Blob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub project_id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub storage_kind: StorageKind,
    pub file_count: usize,
}

impl OwnedRecord for ProjectMeta {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn recency(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Clone)]
pub struct ProjectStore {
    files: RecordStore,
    meta: RecordStore,
    enumerator: BulkEnumerator,
}

impl ProjectStore {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            files: RecordStore::new(handle.clone(), Domain::ProjectFiles),
            meta: RecordStore::new(handle.clone(), Domain::ProjectMeta),
            enumerator: BulkEnumerator::new(handle),
        }
    }

    /// Stores a taken-over project. The file list is only cached for
    /// [`StorageKind::Redis`] projects.
    pub async fn save_project(
        &self,
        project_id: &str,
        owner_id: &str,
        files: &[ProjectFile],
        storage_kind: StorageKind,
    ) -> CacheResult<bool> {
        let project_id = require_id("project_id", project_id)?;
        let owner_id = require_id("owner_id", owner_id)?;

        let files_written = match storage_kind {
            StorageKind::Redis => self.files.save(project_id, files).await?,
            StorageKind::Blob => true,
        };

        let meta = ProjectMeta {
            project_id: project_id.to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
            storage_kind,
            file_count: files.len(),
        };
        let meta_written = self.meta.save(project_id, &meta).await?;

        Ok(files_written && meta_written)
    }

    pub async fn save_meta(&self, meta: &ProjectMeta) -> CacheResult<bool> {
        require_id("owner_id", &meta.owner_id)?;
        self.meta.save(&meta.project_id, meta).await
    }

    pub async fn load_files(&self, project_id: &str) -> CacheResult<Option<Vec<ProjectFile>>> {
        self.files.load(project_id).await
    }

    pub async fn load_meta(&self, project_id: &str) -> CacheResult<Option<ProjectMeta>> {
        self.meta.load(project_id).await
    }

    /// Replaces the file at `path`, or appends it when absent. A project
    /// with no cached tree starts from an empty one.
    ///
    /// Blob-stored projects keep their files outside the cache, so edits to
    /// them are refused with `Ok(false)` and nothing is written.
    pub async fn update_file(&self, project_id: &str, path: &str, content: &str) -> CacheResult<bool> {
        let project_id = require_id("project_id", project_id)?;
        let path = require_id("path", path)?;

        if let Some(meta) = self.load_meta(project_id).await? {
            if meta.storage_kind == StorageKind::Blob {
                debug!(project_id, path, "Skipping file update for blob-stored project");
                return Ok(false);
            }
        }

        let mut files = self.load_files(project_id).await?.unwrap_or_default();
        let updated = ProjectFile::new(path, content);
        match files.iter_mut().find(|f| f.path == path) {
            Some(existing) => *existing = updated,
            None => files.push(updated),
        }

        let written = self.files.save(project_id, &files).await?;
        if written {
            self.sync_file_count(project_id, files.len()).await?;
        }
        Ok(written)
    }

    /// Removes the file at `path`. Returns false when the project or the
    /// file is not cached.
    pub async fn delete_file(&self, project_id: &str, path: &str) -> CacheResult<bool> {
        let project_id = require_id("project_id", project_id)?;
        let path = require_id("path", path)?;

        let Some(mut files) = self.load_files(project_id).await? else {
            return Ok(false);
        };
        let before = files.len();
        files.retain(|f| f.path != path);
        if files.len() == before {
            return Ok(false);
        }

        let written = self.files.save(project_id, &files).await?;
        if written {
            self.sync_file_count(project_id, files.len()).await?;
        }
        Ok(written)
    }

    pub async fn delete_project(&self, project_id: &str) -> CacheResult<bool> {
        let files_removed = self.files.delete(project_id).await?;
        let meta_removed = self.meta.delete(project_id).await?;
        Ok(files_removed || meta_removed)
    }

    /// All cached projects of `owner_id`, newest first.
    pub async fn list_projects(&self, owner_id: &str) -> CacheResult<Vec<ProjectMeta>> {
        self.enumerator
            .list_by_owner(&Domain::ProjectMeta.pattern(), owner_id)
            .await
    }

    async fn sync_file_count(&self, project_id: &str, file_count: usize) -> CacheResult<()> {
        if let Some(mut meta) = self.load_meta(project_id).await? {
            if meta.file_count != file_count {
                meta.file_count = file_count;
                self.meta.save(project_id, &meta).await?;
                debug!(project_id, file_count, "Updated project file count");
            }
        }
        Ok(())
    }
}
