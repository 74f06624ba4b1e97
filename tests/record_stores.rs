use std::sync::Arc;

use sajtmaskin_cache::stores::{JobStatus, ProjectFile, SessionRecord, StorageKind};
use sajtmaskin_cache::{CacheServices, KvBackend, MemoryBackend, StoreHandle};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AuditSummary {
    id: String,
    score: u32,
}

fn services() -> (CacheServices, MemoryBackend) {
    let backend = MemoryBackend::new();
    let services = CacheServices::with_handle(StoreHandle::with_backend(Arc::new(backend.clone())));
    (services, backend)
}

#[tokio::test]
async fn artifact_write_invalidates_owner_list() {
    let (services, backend) = services();
    let artifacts = &services.artifacts;

    let listing = vec![AuditSummary { id: "a0".into(), score: 70 }];
    assert!(artifacts.save_list("u1", &listing).await.unwrap());
    assert!(backend.contains("audit_list:u1"));

    let audit = json!({"url": "https://example.com", "score": 91});
    assert!(artifacts.save("a1", "u1", &audit).await.unwrap());

    assert!(!backend.contains("audit_list:u1"));
    let list: Option<Vec<AuditSummary>> = artifacts.load_list("u1").await.unwrap();
    assert!(list.is_none());
    let loaded: Option<serde_json::Value> = artifacts.load("a1").await.unwrap();
    assert_eq!(loaded, Some(audit));
}

#[tokio::test]
async fn artifact_write_leaves_other_owners_lists() {
    let (services, backend) = services();
    services
        .artifacts
        .save_list("u2", &[AuditSummary { id: "b".into(), score: 1 }])
        .await
        .unwrap();
    services.artifacts.save("a1", "u1", &json!({})).await.unwrap();
    assert!(backend.contains("audit_list:u2"));
}

#[tokio::test]
async fn corrupted_session_is_deleted_on_read() {
    let (services, backend) = services();
    backend.insert_raw("user:session:u1", "{not json");

    assert_eq!(services.sessions.load("u1").await.unwrap(), None);
    assert!(!backend.contains("user:session:u1"));

    // A fresh write after recovery works normally.
    let session = SessionRecord::new("u1", "a@example.com", 5);
    services.sessions.save(&session).await.unwrap();
    assert_eq!(services.sessions.load("u1").await.unwrap(), Some(session));
}

#[tokio::test]
async fn session_with_wrong_shape_is_corruption() {
    let (services, backend) = services();
    backend.insert_raw("user:session:u1", r#"{"unexpected": true}"#);

    assert_eq!(services.sessions.load("u1").await.unwrap(), None);
    assert!(!backend.contains("user:session:u1"));
}

#[tokio::test]
async fn update_credits_rewrites_cached_session() {
    let (services, _) = services();
    assert!(!services.sessions.update_credits("u1", 10).await.unwrap());

    services
        .sessions
        .save(&SessionRecord::new("u1", "a@example.com", 5))
        .await
        .unwrap();
    assert!(services.sessions.update_credits("u1", 2).await.unwrap());
    assert_eq!(services.sessions.load("u1").await.unwrap().unwrap().credits, 2);
}

#[tokio::test]
async fn file_tree_update_then_delete() {
    let (services, _) = services();
    let projects = &services.projects;

    assert!(projects.update_file("p1", "a.txt", "x").await.unwrap());
    assert!(projects.update_file("p1", "b.txt", "y").await.unwrap());
    assert!(projects.delete_file("p1", "a.txt").await.unwrap());

    let files = projects.load_files("p1").await.unwrap().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "b.txt");
    assert_eq!(files[0].content, "y");
}

#[tokio::test]
async fn file_tree_update_replaces_existing_path() {
    let (services, _) = services();
    let projects = &services.projects;
    projects
        .save_project(
            "p1",
            "u1",
            &[ProjectFile::new("index.html", "old"), ProjectFile::new("app.js", "js")],
            StorageKind::Redis,
        )
        .await
        .unwrap();

    projects.update_file("p1", "index.html", "new").await.unwrap();

    let files = projects.load_files("p1").await.unwrap().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].path, "index.html");
    assert_eq!(files[0].content, "new");
    assert!(!projects.delete_file("p1", "missing.css").await.unwrap());
}

#[tokio::test]
async fn file_count_follows_tree_changes() {
    let (services, _) = services();
    let projects = &services.projects;
    projects
        .save_project("p1", "u1", &[ProjectFile::new("a", "1")], StorageKind::Redis)
        .await
        .unwrap();

    projects.update_file("p1", "b", "2").await.unwrap();
    assert_eq!(projects.load_meta("p1").await.unwrap().unwrap().file_count, 2);

    projects.delete_file("p1", "a").await.unwrap();
    assert_eq!(projects.load_meta("p1").await.unwrap().unwrap().file_count, 1);
}

#[tokio::test]
async fn blob_project_caches_metadata_only() {
    let (services, backend) = services();
    services
        .projects
        .save_project("p1", "u1", &[ProjectFile::new("a", "1")], StorageKind::Blob)
        .await
        .unwrap();

    assert!(!backend.contains("project:files:p1"));
    let meta = services.projects.load_meta("p1").await.unwrap().unwrap();
    assert_eq!(meta.storage_kind, StorageKind::Blob);
    assert_eq!(meta.file_count, 1);

    assert!(services.projects.delete_project("p1").await.unwrap());
    assert!(backend.is_empty());
}

#[tokio::test]
async fn job_lifecycle() {
    let (services, _) = services();
    let jobs = &services.jobs;

    let job = jobs.create(Some("u1")).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    assert!(jobs
        .update_status(&job.job_id, JobStatus::InProgress, None, None)
        .await
        .unwrap());
    assert!(jobs
        .update_status(
            &job.job_id,
            JobStatus::Completed,
            Some(json!({"url": "https://cdn.example.com/v.mp4"})),
            None
        )
        .await
        .unwrap());

    let done = jobs.load(&job.job_id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.status.is_terminal());
    assert_eq!(done.owner_id.as_deref(), Some("u1"));
    assert!(done.updated_at >= done.created_at);

    assert!(!jobs
        .update_status("unknown", JobStatus::Failed, None, Some("boom".into()))
        .await
        .unwrap());
}

#[tokio::test]
async fn generic_cache_read_through() {
    let (services, _) = services();

    let first: Result<u32, sajtmaskin_cache::CacheError> = services
        .cache
        .get_or_compute("answer", None, || async { Ok(42) })
        .await;
    assert_eq!(first.unwrap(), 42);

    let second: Result<u32, sajtmaskin_cache::CacheError> = services
        .cache
        .get_or_compute("answer", None, || async { Ok(0) })
        .await;
    assert_eq!(second.unwrap(), 42);
}

#[tokio::test]
async fn empty_identifiers_are_rejected() {
    let (services, backend) = services();

    assert!(services.sessions.load("").await.unwrap_err().is_caller_error());
    assert!(services.cache.set("", &1, None).await.unwrap_err().is_caller_error());
    assert!(services
        .artifacts
        .save("a1", "", &json!({}))
        .await
        .unwrap_err()
        .is_caller_error());
    assert!(services
        .projects
        .update_file("p1", "", "x")
        .await
        .unwrap_err()
        .is_caller_error());
    assert!(backend.is_empty());
}

#[tokio::test]
async fn backend_outage_reads_miss_and_writes_report_false() {
    let (services, backend) = services();
    services
        .sessions
        .save(&SessionRecord::new("u1", "a@example.com", 1))
        .await
        .unwrap();

    backend.set_failing(true);
    assert_eq!(services.sessions.load("u1").await.unwrap(), None);
    assert!(!services
        .sessions
        .save(&SessionRecord::new("u2", "b@example.com", 1))
        .await
        .unwrap());
    assert!(!services.projects.update_file("p1", "a", "x").await.unwrap());
    assert!(services.projects.list_projects("u1").await.unwrap().is_empty());

    backend.set_failing(false);
    assert!(services.sessions.load("u1").await.unwrap().is_some());
    assert!(backend.get("user:session:u2").await.unwrap().is_none());
}
