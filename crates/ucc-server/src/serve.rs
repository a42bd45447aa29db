//! Shared server bring-up: builds the stores, the shared `Orchestrator`,
//! spawns the worker pool and retention sweep, then serves axum until
//! Ctrl-C. Used by both the `ucc-server` binary and `ucc serve` in
//! `ucc-cli`, so the two never drift.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

use ucc_core::config::UccConfig;
use ucc_core::ports::{JobStore, SegmentStore};
use ucc_embed::select_embedder;
use ucc_orchestrator::ProgressBus;
use ucc_store::{InMemoryStore, PgJobStore, PgSegmentStore};

use crate::router::build_router;
use crate::state::AppState;

/// Runs the HTTP + WebSocket server to completion (until Ctrl-C). Binds
/// `bind_addr`; uses Postgres when `config.database_url` is set, otherwise
/// an in-memory store (fine for local/dev, not durable).
pub async fn serve(config: UccConfig, bind_addr: &str) -> anyhow::Result<()> {
    let (job_store, segment_store): (Arc<dyn JobStore>, Arc<dyn SegmentStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await?;
                tracing::info!("connected to Postgres job store");
                (
                    Arc::new(PgJobStore::new(pool.clone())),
                    Arc::new(PgSegmentStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory job store (not durable)");
                let store = Arc::new(InMemoryStore::new());
                (store.clone(), store)
            }
        };

    let embedder = select_embedder(&config);
    let progress = Arc::new(ProgressBus::new());
    let state = AppState::new(
        job_store.clone(),
        segment_store,
        embedder,
        progress,
        config.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    for worker in 0..config.worker_concurrency.max(1) {
        let orchestrator = state.orchestrator.clone();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move {
            tracing::info!(worker, "starting orchestrator worker");
            orchestrator.run_worker_loop(rx).await;
        });
    }

    let retention_store = job_store;
    let job_ttl = config.job_ttl;
    let mut retention_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(300)) => {
                    match retention_store.purge_expired(job_ttl).await {
                        Ok(purged) if !purged.is_empty() => {
                            tracing::info!(count = purged.len(), "purged expired jobs");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
                    }
                }
                _ = retention_shutdown.changed() => {
                    if *retention_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let app = build_router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("ucc-server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;
    Ok(())
}
