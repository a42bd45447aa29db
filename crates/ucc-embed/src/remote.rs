//! `RemoteEmbedder`: calls an external embedding API over HTTP.
//!
//! `spec.md` §4.5 gives a 30s per-call timeout and requires embed_batch to
//! preserve input order; on failure the caller (the Aligner) is expected to
//! fall back to lexical similarity and emit a warning, so every error path
//! here is classified `EmbeddingTransient`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ucc_core::error::{Result, UccError};
use ucc_core::ports::Embedder;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model_id: String,
}

impl RemoteEmbedder {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model_id: "remote-default".to_string(),
        }
    }

    async fn call(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model_id,
                input: texts,
            });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| UccError::EmbeddingTransient(format!("remote embedder request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(UccError::EmbeddingTransient(format!(
                "remote embedder returned status {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| UccError::EmbeddingTransient(format!("malformed embedder response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(UccError::EmbeddingTransient(
                "embedder returned a mismatched batch size".into(),
            ));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.call(std::slice::from_ref(&text.to_string())).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| UccError::EmbeddingTransient("empty embedder response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.call(texts).await
    }
}
