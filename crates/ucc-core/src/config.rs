//! `UccConfig` — a single value constructed once from the environment and
//! threaded through constructors (Orchestrator, Embedder selection, stores).
//! No global mutable state is introduced anywhere downstream of this.

use std::time::Duration;

/// Which `Embedder` backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    Auto,
    Local,
    Remote,
}

impl EmbedderKind {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "remote" => Self::Remote,
            _ => Self::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UccConfig {
    pub embedder: EmbedderKind,
    pub similarity_threshold: f64,
    pub max_retries: u32,
    pub job_ttl: Duration,
    pub segment_soft_timeout: Duration,
    pub job_hard_timeout: Duration,
    pub max_candidates_per_clause: usize,
    pub worker_concurrency: usize,
    pub database_url: Option<String>,
    pub remote_embedder_url: Option<String>,
    pub remote_embedder_api_key: Option<String>,
}

impl Default for UccConfig {
    fn default() -> Self {
        Self {
            embedder: EmbedderKind::Auto,
            similarity_threshold: 0.72,
            max_retries: 3,
            job_ttl: Duration::from_secs(24 * 60 * 60),
            segment_soft_timeout: Duration::from_secs(540),
            job_hard_timeout: Duration::from_secs(600),
            max_candidates_per_clause: 2,
            worker_concurrency: 2,
            database_url: None,
            remote_embedder_url: None,
            remote_embedder_api_key: None,
        }
    }
}

impl UccConfig {
    /// Load configuration from the environment, falling back to spec defaults
    /// for anything unset or unparseable. Call `dotenvy::dotenv().ok()` before
    /// this in `main` to pick up a `.env` file in dev.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            embedder: std::env::var("UCC_EMBEDDER")
                .ok()
                .map(|v| EmbedderKind::parse(&v))
                .unwrap_or(defaults.embedder),
            similarity_threshold: env_f64("UCC_SIMILARITY_THRESHOLD")
                .unwrap_or(defaults.similarity_threshold),
            max_retries: env_u32("UCC_MAX_RETRIES").unwrap_or(defaults.max_retries),
            job_ttl: env_u64("UCC_JOB_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_ttl),
            segment_soft_timeout: env_u64("UCC_SEGMENT_SOFT_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.segment_soft_timeout),
            job_hard_timeout: env_u64("UCC_JOB_HARD_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_hard_timeout),
            max_candidates_per_clause: std::env::var("UCC_MAX_CANDIDATES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_candidates_per_clause),
            worker_concurrency: std::env::var("UCC_WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.worker_concurrency),
            database_url: std::env::var("DATABASE_URL").ok(),
            remote_embedder_url: std::env::var("UCC_REMOTE_EMBEDDER_URL").ok(),
            remote_embedder_api_key: std::env::var("UCC_REMOTE_EMBEDDER_API_KEY").ok(),
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = UccConfig::default();
        assert_eq!(cfg.similarity_threshold, 0.72);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.max_candidates_per_clause, 2);
        assert_eq!(cfg.job_hard_timeout, Duration::from_secs(600));
    }

    #[test]
    fn embedder_kind_parses_case_insensitively() {
        assert_eq!(EmbedderKind::parse("Local"), EmbedderKind::Local);
        assert_eq!(EmbedderKind::parse("REMOTE"), EmbedderKind::Remote);
        assert_eq!(EmbedderKind::parse("whatever"), EmbedderKind::Auto);
    }
}
