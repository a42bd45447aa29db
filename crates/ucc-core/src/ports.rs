//! Storage and backend port traits. Pipeline and orchestrator logic depends
//! only on these; concrete adapters (Postgres, in-memory, local/remote
//! embedder) live in `ucc-store` / `ucc-embed`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ComparisonResult, Job, JobStatus};

pub type JobId = uuid::Uuid;

/// Partial update applied to a `Job` row. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub current_segment: Option<u8>,
    pub current_segment_name: Option<String>,
    pub progress_pct: Option<u8>,
    pub error_message: Option<Option<String>>,
    pub result_pointer: Option<Option<String>>,
    pub started_at_now: bool,
    pub completed_at_now: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `spec.md` §4.9. Single-writer semantics per `job_id` are the
/// implementation's responsibility (row-level locking or CAS on `updated_at`
/// for Postgres; a per-job mutex for the in-memory adapter).
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: Job) -> Result<()>;
    async fn get(&self, job_id: JobId) -> Result<Job>;
    async fn update(&self, job_id: JobId, fields: JobUpdate) -> Result<Job>;
    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>>;
    async fn set_result(&self, job_id: JobId, result: &ComparisonResult) -> Result<()>;
    async fn get_result(&self, job_id: JobId) -> Result<Option<ComparisonResult>>;
    /// Purge jobs (and their segment artifacts, via `SegmentStore`) whose
    /// terminal transition happened more than `ttl` ago. Returns purged ids.
    async fn purge_expired(&self, ttl: std::time::Duration) -> Result<Vec<JobId>>;

    /// Atomically claim the next `QUEUED` job for a worker, transitioning it
    /// to `RUNNING`. Returns `None` if the queue is empty. Mirrors the
    /// `FOR UPDATE SKIP LOCKED` claim pattern used for concurrent workers.
    async fn claim_next_queued(&self) -> Result<Option<Job>>;
}

/// Segment artifact kinds stored by `SegmentStore`, serialized as JSON blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Blocks,
    Definitions,
    Clauses,
    Matches,
    Result,
}

/// `spec.md` §4.12. Keys are `(doc_id, segment_id)` for per-document segments
/// and `(job_id, segment_id)` for pair segments; callers pass whichever
/// identifier is meaningful for the kind being stored.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn put(&self, key: &str, kind: SegmentKind, value: serde_json::Value) -> Result<()>;
    async fn get(&self, key: &str, kind: SegmentKind) -> Result<Option<serde_json::Value>>;
    async fn delete_all_for(&self, key: &str) -> Result<()>;
}

/// `spec.md` §4.5. `embed_batch` must preserve input order; implementations
/// must be deterministic for a fixed model id.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
