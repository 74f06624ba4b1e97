// src/stores/jobs.rs - Async generation jobs (video:job:<jobId>, 1h, fixed)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CacheResult;
use crate::keys::Domain;
use crate::store::StoreHandle;

use super::record::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(job_id: impl Into<String>, owner_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            owner_id,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone)]
pub struct JobStore {
    records: RecordStore,
}

impl JobStore {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            records: RecordStore::new(handle, Domain::AsyncJob),
        }
    }

    /// Registers a new queued job under a fresh id and returns the record.
    /// The record is returned even if the cache could not store it.
    pub async fn create(&self, owner_id: Option<&str>) -> CacheResult<JobRecord> {
        let job = JobRecord::queued(Uuid::new_v4().to_string(), owner_id.map(str::to_string));
        self.save(&job).await?;
        Ok(job)
    }

    pub async fn save(&self, job: &JobRecord) -> CacheResult<bool> {
        self.records.save(&job.job_id, job).await
    }

    pub async fn load(&self, job_id: &str) -> CacheResult<Option<JobRecord>> {
        self.records.load(job_id).await
    }

    /// Moves the job to `status`. `result` and `error` replace the stored
    /// values only when given. Returns false when the job is unknown or
    /// already expired.
    pub async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> CacheResult<bool> {
        let Some(mut job) = self.load(job_id).await? else {
            return Ok(false);
        };
        job.status = status;
        if result.is_some() {
            job.result = result;
        }
        if error.is_some() {
            job.error = error;
        }
        job.updated_at = Utc::now();
        self.records.save(job_id, &job).await
    }

    pub async fn delete(&self, job_id: &str) -> CacheResult<bool> {
        self.records.delete(job_id).await
    }
}
