//! Router construction, mirroring `sem_os_server::router::build_router`'s
//! single-file route table (`spec.md` §6 has no auth layer to add — explicit
//! non-goal, see `DESIGN.md`).

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ucc/preprocess", post(handlers::preprocess::preprocess))
        .route("/ucc/compare", post(handlers::compare::compare))
        .route("/jobs/compare", post(handlers::jobs::submit_compare))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs/:job_id", get(handlers::jobs::get_job))
        .route("/jobs/:job_id/result", get(handlers::jobs::get_job_result))
        .route("/jobs/:job_id/cancel", post(handlers::jobs::cancel_job))
        .route("/ws/jobs/:job_id", get(handlers::ws::job_progress_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
