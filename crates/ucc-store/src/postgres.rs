//! Postgres `JobStore` + `SegmentStore`, grounded on
//! `sem_os_postgres::store`'s newtype-over-`PgPool` style: runtime-checked
//! `sqlx::query`/`query_as` (no `query!`, since `migrations/0001_init.sql` is
//! applied out of band). Failures are wrapped as `StoreError` and aggregated
//! into `UccError` via `#[from]`, so the Orchestrator's retry policy picks
//! `Unavailable` up as transient and everything else as fatal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ucc_core::error::{Result, StoreError, UccError};
use ucc_core::ports::{JobFilter, JobId, JobStore, JobUpdate, SegmentKind, SegmentStore};
use ucc_core::types::{ComparisonResult, Job, JobStatus};

fn storage_err(e: sqlx::Error) -> UccError {
    StoreError::Unavailable(e.to_string()).into()
}

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "PENDING",
        JobStatus::Queued => "QUEUED",
        JobStatus::Running => "RUNNING",
        JobStatus::Retrying => "RETRYING",
        JobStatus::Completed => "COMPLETED",
        JobStatus::Failed => "FAILED",
        JobStatus::Cancelled => "CANCELLED",
    }
}

fn status_from_str(s: &str) -> Result<JobStatus> {
    match s {
        "PENDING" => Ok(JobStatus::Pending),
        "QUEUED" => Ok(JobStatus::Queued),
        "RUNNING" => Ok(JobStatus::Running),
        "RETRYING" => Ok(JobStatus::Retrying),
        "COMPLETED" => Ok(JobStatus::Completed),
        "FAILED" => Ok(JobStatus::Failed),
        "CANCELLED" => Ok(JobStatus::Cancelled),
        other => Err(StoreError::Decode(format!("unknown job status in database: {other}")).into()),
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: Uuid,
    doc_id_a: String,
    doc_id_b: String,
    file_name_a: String,
    file_name_b: String,
    status: String,
    current_segment: i16,
    current_segment_name: String,
    progress_pct: i16,
    error_message: Option<String>,
    result_pointer: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            job_id: self.job_id,
            doc_id_a: self.doc_id_a,
            doc_id_b: self.doc_id_b,
            file_name_a: self.file_name_a,
            file_name_b: self.file_name_b,
            status: status_from_str(&self.status)?,
            current_segment: self.current_segment as u8,
            current_segment_name: self.current_segment_name,
            progress_pct: self.progress_pct as u8,
            error_message: self.error_message,
            result_pointer: self.result_pointer,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                job_id, doc_id_a, doc_id_b, file_name_a, file_name_b,
                status, current_segment, current_segment_name, progress_pct,
                error_message, result_pointer, created_at, started_at,
                completed_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(job.job_id)
        .bind(&job.doc_id_a)
        .bind(&job.doc_id_b)
        .bind(&job.file_name_a)
        .bind(&job.file_name_b)
        .bind(status_to_str(job.status))
        .bind(job.current_segment as i16)
        .bind(&job.current_segment_name)
        .bind(job.progress_pct as i16)
        .bind(&job.error_message)
        .bind(&job.result_pointer)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT job_id, doc_id_a, doc_id_b, file_name_a, file_name_b,
                   status, current_segment, current_segment_name, progress_pct,
                   error_message, result_pointer, created_at, started_at,
                   completed_at, updated_at
            FROM jobs WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| UccError::NotFound(format!("job {job_id}")))?;
        row.into_job()
    }

    async fn update(&self, job_id: JobId, fields: JobUpdate) -> Result<Job> {
        // Single UPDATE with COALESCE-free explicit field writes; callers pass
        // only the fields that changed, `None` leaves the column untouched, so
        // this reads current values first rather than building dynamic SQL.
        let current = self.get(job_id).await?;

        let status = fields.status.unwrap_or(current.status);
        let current_segment = fields.current_segment.unwrap_or(current.current_segment);
        let current_segment_name = fields
            .current_segment_name
            .unwrap_or(current.current_segment_name);
        let progress_pct = fields.progress_pct.unwrap_or(current.progress_pct);
        let error_message = fields.error_message.unwrap_or(current.error_message);
        let result_pointer = fields.result_pointer.unwrap_or(current.result_pointer);
        let started_at = if fields.started_at_now {
            Some(Utc::now())
        } else {
            current.started_at
        };
        let completed_at = if fields.completed_at_now {
            Some(Utc::now())
        } else {
            current.completed_at
        };

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs SET
                status = $2,
                current_segment = $3,
                current_segment_name = $4,
                progress_pct = $5,
                error_message = $6,
                result_pointer = $7,
                started_at = $8,
                completed_at = $9,
                updated_at = now()
            WHERE job_id = $1
            RETURNING job_id, doc_id_a, doc_id_b, file_name_a, file_name_b,
                      status, current_segment, current_segment_name, progress_pct,
                      error_message, result_pointer, created_at, started_at,
                      completed_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(status_to_str(status))
        .bind(current_segment as i16)
        .bind(&current_segment_name)
        .bind(progress_pct as i16)
        .bind(&error_message)
        .bind(&result_pointer)
        .bind(started_at)
        .bind(completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        row.into_job()
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let limit = filter.limit.unwrap_or(100);
        let offset = filter.offset.unwrap_or(0);
        let rows = match filter.status {
            Some(status) => {
                sqlx::query_as::<_, JobRow>(
                    r#"
                    SELECT job_id, doc_id_a, doc_id_b, file_name_a, file_name_b,
                           status, current_segment, current_segment_name, progress_pct,
                           error_message, result_pointer, created_at, started_at,
                           completed_at, updated_at
                    FROM jobs WHERE status = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(status_to_str(status))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, JobRow>(
                    r#"
                    SELECT job_id, doc_id_a, doc_id_b, file_name_a, file_name_b,
                           status, current_segment, current_segment_name, progress_pct,
                           error_message, result_pointer, created_at, started_at,
                           completed_at, updated_at
                    FROM jobs ORDER BY created_at DESC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(storage_err)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn set_result(&self, job_id: JobId, result: &ComparisonResult) -> Result<()> {
        let value = serde_json::to_value(result)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        sqlx::query("UPDATE jobs SET result = $2, updated_at = now() WHERE job_id = $1")
            .bind(job_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_result(&self, job_id: JobId) -> Result<Option<ComparisonResult>> {
        let row: Option<(Option<serde_json::Value>,)> =
            sqlx::query_as("SELECT result FROM jobs WHERE job_id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;
        match row.and_then(|(v,)| v) {
            Some(value) => Ok(Some(
                serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn purge_expired(&self, ttl: std::time::Duration) -> Result<Vec<JobId>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            DELETE FROM jobs
            WHERE status IN ('COMPLETED', 'FAILED', 'CANCELLED')
              AND completed_at IS NOT NULL
              AND completed_at < $1
            RETURNING job_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let job_ids: Vec<JobId> = ids.into_iter().map(|(id,)| id).collect();
        for job_id in &job_ids {
            sqlx::query("DELETE FROM segment_artifacts WHERE key = $1")
                .bind(job_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        Ok(job_ids)
    }

    async fn claim_next_queued(&self) -> Result<Option<Job>> {
        // CTE + FOR UPDATE SKIP LOCKED so concurrent workers never claim the
        // same row, mirroring `sem_os_postgres::PgOutboxStore::claim_next`.
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            WITH claimable AS (
                SELECT job_id
                FROM jobs
                WHERE status = 'QUEUED'
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs j
            SET status = 'RUNNING',
                started_at = now(),
                updated_at = now()
            FROM claimable c
            WHERE j.job_id = c.job_id
            RETURNING j.job_id, j.doc_id_a, j.doc_id_b, j.file_name_a, j.file_name_b,
                      j.status, j.current_segment, j.current_segment_name, j.progress_pct,
                      j.error_message, j.result_pointer, j.created_at, j.started_at,
                      j.completed_at, j.updated_at
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(JobRow::into_job).transpose()
    }
}

pub struct PgSegmentStore {
    pool: PgPool,
}

impl PgSegmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn kind_to_str(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Blocks => "blocks",
        SegmentKind::Definitions => "definitions",
        SegmentKind::Clauses => "clauses",
        SegmentKind::Matches => "matches",
        SegmentKind::Result => "result",
    }
}

#[async_trait]
impl SegmentStore for PgSegmentStore {
    async fn put(&self, key: &str, kind: SegmentKind, value: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO segment_artifacts (key, kind, value_blob, created_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (key, kind) DO UPDATE SET value_blob = EXCLUDED.value_blob
            "#,
        )
        .bind(key)
        .bind(kind_to_str(kind))
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, key: &str, kind: SegmentKind) -> Result<Option<serde_json::Value>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT value_blob FROM segment_artifacts WHERE key = $1 AND kind = $2",
        )
        .bind(key)
        .bind(kind_to_str(kind))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(|(v,)| v))
    }

    async fn delete_all_for(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM segment_artifacts WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
