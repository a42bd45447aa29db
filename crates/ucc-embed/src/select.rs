//! Backend selection. `spec.md` §9: "Embedder backend selected at
//! orchestration start, not at request time" — callers build one
//! `Arc<dyn Embedder>` per job/run and pass it down; nothing here is global.

use std::sync::Arc;

use ucc_core::config::{EmbedderKind, UccConfig};
use ucc_core::ports::Embedder;

use crate::local::LocalEmbedder;
use crate::remote::RemoteEmbedder;

/// Resolve the configured `EmbedderKind` into a concrete backend.
///
/// `Auto` prefers the remote backend when a URL is configured, falling back
/// to the always-available local backend otherwise.
pub fn select_embedder(config: &UccConfig) -> Arc<dyn Embedder> {
    match config.embedder {
        EmbedderKind::Local => Arc::new(LocalEmbedder::new()),
        EmbedderKind::Remote => build_remote_or_local(config),
        EmbedderKind::Auto => {
            if config.remote_embedder_url.is_some() {
                build_remote_or_local(config)
            } else {
                Arc::new(LocalEmbedder::new())
            }
        }
    }
}

fn build_remote_or_local(config: &UccConfig) -> Arc<dyn Embedder> {
    match &config.remote_embedder_url {
        Some(url) => Arc::new(RemoteEmbedder::new(
            url.clone(),
            config.remote_embedder_api_key.clone(),
        )),
        None => {
            tracing::warn!("UCC_EMBEDDER=remote requested but no remote URL configured; falling back to local");
            Arc::new(LocalEmbedder::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_without_remote_url_picks_local() {
        let cfg = UccConfig {
            embedder: EmbedderKind::Auto,
            remote_embedder_url: None,
            ..UccConfig::default()
        };
        let e = select_embedder(&cfg);
        assert_eq!(e.model_id(), "local-hashing-v1");
    }

    #[test]
    fn remote_without_url_falls_back_to_local() {
        let cfg = UccConfig {
            embedder: EmbedderKind::Remote,
            remote_embedder_url: None,
            ..UccConfig::default()
        };
        let e = select_embedder(&cfg);
        assert_eq!(e.model_id(), "local-hashing-v1");
    }
}
