//! `POST /ucc/compare` — synchronous clause comparison (`spec.md` §6). Runs
//! the full 12-segment chain to completion in this request, against a
//! throwaway in-memory job/segment store and (per-request) `options`
//! overrides, since a one-shot call has no reason to touch the shared
//! async job queue or its fixed-at-startup config.

use axum::extract::{Multipart, State};
use axum::Json;
use std::sync::Arc;

use ucc_core::error::UccError;
use ucc_core::types::ComparisonResult;
use ucc_embed::select_embedder;
use ucc_orchestrator::{Orchestrator, ProgressBus};
use ucc_store::InMemoryStore;

use crate::error::AppError;
use crate::multipart::collect_pair;
use crate::options::CompareOptions;
use crate::state::AppState;

pub async fn compare(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ComparisonResult>, AppError> {
    let upload = collect_pair(multipart).await?;
    let options = CompareOptions::parse(upload.options_raw.as_deref())?;
    let config = options.apply(&state.config);
    let embedder = select_embedder(&config);

    let store = Arc::new(InMemoryStore::new());
    let orchestrator = Orchestrator::new(
        store.clone(),
        store,
        embedder,
        Arc::new(ProgressBus::new()),
        config,
    );

    let result = match tokio::time::timeout(
        state.config.job_hard_timeout,
        orchestrator.submit_and_run(
            upload.file_name_a,
            upload.bytes_a,
            upload.file_name_b,
            upload.bytes_b,
        ),
    )
    .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => return Err(AppError::from(e)),
        Err(_elapsed) => return Err(AppError::from(UccError::Timeout)),
    };

    Ok(Json(strip_token_diffs_if_requested(result, &options)))
}

fn strip_token_diffs_if_requested(
    mut result: ComparisonResult,
    options: &CompareOptions,
) -> ComparisonResult {
    if !options.return_token_diffs() {
        for m in &mut result.matches {
            m.token_diff = None;
        }
    }
    result
}
