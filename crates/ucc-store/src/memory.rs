//! In-memory `JobStore` + `SegmentStore`, backed by `HashMap` guarded by
//! `tokio::sync::RwLock` (`spec.md` §4.x Ambient: Persistence). Used by
//! `ucc-cli`'s single-shot `/ucc/compare` path and by every other crate's
//! test suite; single-writer semantics per `job_id` come from the single
//! lock rather than row-level locking, which is fine at this scale.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use ucc_core::error::{Result, UccError};
use ucc_core::ports::{JobFilter, JobId, JobStore, JobUpdate, SegmentKind, SegmentStore};
use ucc_core::types::{ComparisonResult, Job};

#[derive(Default)]
pub struct InMemoryStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    results: RwLock<HashMap<JobId, ComparisonResult>>,
    segments: RwLock<HashMap<(String, SegmentKind), serde_json::Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn create(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.job_id, job);
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or_else(|| UccError::NotFound(format!("job {job_id}")))
    }

    async fn update(&self, job_id: JobId, fields: JobUpdate) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| UccError::NotFound(format!("job {job_id}")))?;

        if let Some(status) = fields.status {
            job.status = status;
        }
        if let Some(segment) = fields.current_segment {
            job.current_segment = segment;
        }
        if let Some(name) = fields.current_segment_name {
            job.current_segment_name = name;
        }
        if let Some(pct) = fields.progress_pct {
            job.progress_pct = pct;
        }
        if let Some(msg) = fields.error_message {
            job.error_message = msg;
        }
        if let Some(ptr) = fields.result_pointer {
            job.result_pointer = ptr;
        }
        if fields.started_at_now {
            job.started_at = Some(chrono::Utc::now());
        }
        if fields.completed_at_now {
            job.completed_at = Some(chrono::Utc::now());
        }
        job.updated_at = chrono::Utc::now();
        Ok(job.clone())
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| filter.status.map(|s| j.status == s).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(i64::MAX).max(0) as usize;
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn set_result(&self, job_id: JobId, result: &ComparisonResult) -> Result<()> {
        self.results.write().await.insert(job_id, result.clone());
        Ok(())
    }

    async fn get_result(&self, job_id: JobId) -> Result<Option<ComparisonResult>> {
        Ok(self.results.read().await.get(&job_id).cloned())
    }

    async fn purge_expired(&self, ttl: std::time::Duration) -> Result<Vec<JobId>> {
        let now = chrono::Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let mut jobs = self.jobs.write().await;
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|j| {
                j.status.is_terminal()
                    && j.completed_at
                        .map(|c| now - c > ttl)
                        .unwrap_or(false)
            })
            .map(|j| j.job_id)
            .collect();
        for job_id in &expired {
            jobs.remove(job_id);
            self.results.write().await.remove(job_id);
        }
        Ok(expired)
    }

    async fn claim_next_queued(&self) -> Result<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let next_id = jobs
            .values()
            .filter(|j| j.status == ucc_core::types::JobStatus::Queued)
            .min_by_key(|j| j.created_at)
            .map(|j| j.job_id);
        match next_id {
            Some(job_id) => {
                let job = jobs.get_mut(&job_id).unwrap();
                job.status = ucc_core::types::JobStatus::Running;
                job.started_at = Some(chrono::Utc::now());
                job.updated_at = chrono::Utc::now();
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SegmentStore for InMemoryStore {
    async fn put(&self, key: &str, kind: SegmentKind, value: serde_json::Value) -> Result<()> {
        self.segments
            .write()
            .await
            .insert((key.to_string(), kind), value);
        Ok(())
    }

    async fn get(&self, key: &str, kind: SegmentKind) -> Result<Option<serde_json::Value>> {
        Ok(self
            .segments
            .read()
            .await
            .get(&(key.to_string(), kind))
            .cloned())
    }

    async fn delete_all_for(&self, key: &str) -> Result<()> {
        self.segments.write().await.retain(|(k, _), _| k != key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucc_core::types::JobStatus;

    fn new_job() -> Job {
        Job::new("a".into(), "b".into(), "a.pdf".into(), "b.pdf".into())
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryStore::new();
        let job = new_job();
        let job_id = job.job_id;
        store.create(job).await.unwrap();
        let fetched = store.get(job_id).await.unwrap();
        assert_eq!(fetched.job_id, job_id);
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn get_missing_job_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, UccError::NotFound(_)));
    }

    #[tokio::test]
    async fn claim_next_queued_picks_oldest_and_transitions_to_running() {
        let store = InMemoryStore::new();
        let mut job = new_job();
        job.status = JobStatus::Queued;
        let job_id = job.job_id;
        store.create(job).await.unwrap();

        let claimed = store.claim_next_queued().await.unwrap().unwrap();
        assert_eq!(claimed.job_id, job_id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert!(claimed.started_at.is_some());

        assert!(store.claim_next_queued().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn segment_store_put_get_delete() {
        let store = InMemoryStore::new();
        let value = serde_json::json!({"hello": "world"});
        store
            .put("doc1", SegmentKind::Blocks, value.clone())
            .await
            .unwrap();
        assert_eq!(
            store.get("doc1", SegmentKind::Blocks).await.unwrap(),
            Some(value)
        );
        store.delete_all_for("doc1").await.unwrap();
        assert_eq!(store.get("doc1", SegmentKind::Blocks).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_pages() {
        let store = InMemoryStore::new();
        for _ in 0..3 {
            store.create(new_job()).await.unwrap();
        }
        let mut queued = new_job();
        queued.status = JobStatus::Queued;
        store.create(queued).await.unwrap();

        let all = store.list(JobFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);

        let only_queued = store
            .list(JobFilter {
                status: Some(JobStatus::Queued),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_queued.len(), 1);
    }
}
