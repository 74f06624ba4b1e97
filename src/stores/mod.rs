// src/stores/mod.rs - Domain record stores

pub mod artifact;
pub mod generic;
pub mod jobs;
pub mod preview;
pub mod project;
pub mod record;
pub mod session;

pub use artifact::ArtifactCache;
pub use generic::GenericCache;
pub use jobs::{JobRecord, JobStatus, JobStore};
pub use preview::PreviewCache;
pub use project::{ProjectFile, ProjectMeta, ProjectStore, StorageKind};
pub use record::RecordStore;
pub use session::{SessionRecord, SessionStore};
