//! `LocalEmbedder`: a deterministic, dependency-free bag-of-words hashing
//! model. `spec.md` §4.5 treats the embedding backend as an external,
//! pluggable collaborator and only constrains its contract (fixed dimension,
//! L2-normalized, deterministic for a given model id, order-preserving
//! batches) — this is a faithful, good-enough default for tests and for
//! deployments without a real model service, not a claim of semantic quality.

use async_trait::async_trait;

use ucc_core::error::Result;
use ucc_core::ports::Embedder;

const DIMENSIONS: usize = 256;
const MODEL_ID: &str = "local-hashing-v1";

/// FNV-1a, chosen for determinism across processes/platforms (unlike
/// `std::collections::hash_map::DefaultHasher`, whose output is unspecified).
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub struct LocalEmbedder;

impl LocalEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; DIMENSIONS];
        for token in tokenize(text) {
            let h = fnv1a(token.as_bytes());
            let idx = (h % DIMENSIONS as u64) as usize;
            // sign bit spreads tokens across +/- so near-duplicate bags of
            // words with different token order still cancel predictably.
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_one(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic_and_normalized() {
        let e = LocalEmbedder::new();
        let a = e.embed("We will pay for theft.").await.unwrap();
        let b = e.embed("We will pay for theft.").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let e = LocalEmbedder::new();
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let batch = e.embed_batch(&texts).await.unwrap();
        for (i, text) in texts.iter().enumerate() {
            let single = e.embed(text).await.unwrap();
            assert_eq!(batch[i], single);
        }
    }

    #[tokio::test]
    async fn similar_text_is_closer_than_dissimilar_text() {
        let e = LocalEmbedder::new();
        let a = e.embed("We will pay for theft of property.").await.unwrap();
        let b = e
            .embed("We will pay for theft of personal property.")
            .await
            .unwrap();
        let c = e.embed("Flood damage is excluded entirely.").await.unwrap();
        let cos = |x: &[f32], y: &[f32]| -> f32 { x.iter().zip(y).map(|(p, q)| p * q).sum() };
        assert!(cos(&a, &b) > cos(&a, &c));
    }
}
