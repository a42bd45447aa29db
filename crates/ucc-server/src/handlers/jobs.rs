//! `/jobs/*` — the async job surface (`spec.md` §6). Submission always goes
//! through the shared, server-wide `AppState::orchestrator` (config and
//! embedder fixed once at server start, per `spec.md` §9); the dedicated
//! worker loop spawned in `main` is the only thing that ever calls `drive`.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ucc_core::ports::JobFilter;
use ucc_core::types::{ComparisonResult, Job, JobStatus};

use crate::error::AppError;
use crate::multipart::collect_pair;
use crate::options::CompareOptions;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

pub async fn submit_compare(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, AppError> {
    let upload = collect_pair(multipart).await?;
    // Validated for the wire contract; the shared worker pool's config is
    // what actually drives the job (see module docs).
    CompareOptions::parse(upload.options_raw.as_deref())?;

    let job_id = state
        .orchestrator
        .submit(
            upload.file_name_a,
            upload.bytes_a,
            upload.file_name_b,
            upload.bytes_b,
        )
        .await?;
    Ok(Json(SubmitResponse {
        job_id,
        status: JobStatus::Queued,
    }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.job_store.get(job_id).await?))
}

pub enum JobResultResponse {
    Completed(ComparisonResult),
    StillRunning(Job),
    Purged,
}

impl IntoResponse for JobResultResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Completed(result) => (StatusCode::OK, Json(result)).into_response(),
            Self::StillRunning(job) => (StatusCode::ACCEPTED, Json(job)).into_response(),
            Self::Purged => StatusCode::GONE.into_response(),
        }
    }
}

pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<JobResultResponse, AppError> {
    let job = match state.job_store.get(job_id).await {
        Ok(job) => job,
        Err(e) if e.failure_reason() == "not_found" => return Ok(JobResultResponse::Purged),
        Err(e) => return Err(e.into()),
    };
    if job.status == JobStatus::Completed {
        return match state.job_store.get_result(job_id).await? {
            Some(result) => Ok(JobResultResponse::Completed(result)),
            None => Ok(JobResultResponse::Purged),
        };
    }
    Ok(JobResultResponse::StillRunning(job))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
    pub message: String,
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let cancelled = state.orchestrator.request_cancel(job_id).await?;
    let message = if cancelled {
        "cancellation requested".to_string()
    } else {
        "job already in a terminal state".to_string()
    };
    Ok(Json(CancelResponse { cancelled, message }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Job>>, AppError> {
    let jobs = state
        .job_store
        .list(JobFilter {
            status: query.status,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;
    Ok(Json(jobs))
}
