//! Shared server state, built once in `main` and attached via
//! `axum::Extension`, mirroring `sem_os_server`'s `Extension<Arc<dyn
//! CoreService>>` convention.

use std::sync::Arc;

use ucc_core::config::UccConfig;
use ucc_core::ports::{Embedder, JobStore, SegmentStore};
use ucc_orchestrator::{Orchestrator, ProgressBus};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub job_store: Arc<dyn JobStore>,
    pub segment_store: Arc<dyn SegmentStore>,
    pub embedder: Arc<dyn Embedder>,
    pub progress: Arc<ProgressBus>,
    pub config: UccConfig,
}

impl AppState {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        segment_store: Arc<dyn SegmentStore>,
        embedder: Arc<dyn Embedder>,
        progress: Arc<ProgressBus>,
        config: UccConfig,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            job_store.clone(),
            segment_store.clone(),
            embedder.clone(),
            progress.clone(),
            config.clone(),
        ));
        Self {
            orchestrator,
            job_store,
            segment_store,
            embedder,
            progress,
            config,
        }
    }
}
