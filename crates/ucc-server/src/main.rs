//! ucc-server — standalone REST + WebSocket server for the Universal Clause
//! Comparer.
//!
//! Reads config from env vars (`spec.md` §6): `UCC_EMBEDDER`,
//! `UCC_SIMILARITY_THRESHOLD`, `UCC_MAX_RETRIES`, `UCC_JOB_TTL_SECONDS`,
//! `UCC_SEGMENT_SOFT_TIMEOUT`, `UCC_JOB_HARD_TIMEOUT`, `UCC_MAX_CANDIDATES`,
//! `UCC_WORKER_CONCURRENCY`, `DATABASE_URL`, plus remote-embedder
//! credentials. `UCC_BIND_ADDR` controls the listen address (default
//! `0.0.0.0:4600`).

use ucc_core::config::UccConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ucc_server=debug".into()),
        )
        .init();

    let config = UccConfig::from_env();
    let bind_addr = std::env::var("UCC_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4600".into());

    if let Err(e) = ucc_server::serve(config, &bind_addr).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
