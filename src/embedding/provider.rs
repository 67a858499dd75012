//! The embedding generation collaborator. `EmbeddingProvider` is an
//! external-collaborator contract: the model itself is never implemented
//! here, only consumed.
//!
//! The OpenAI-style HTTP provider keeps an order-preserving batch call with
//! Bearer auth, since that's the clearest real-world shape for "the
//! embedding function may be slow, may fail".

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};

/// `embed_batch(texts) -> vectors`, one per text, in order, fixed dimension
/// tied to the model id. Implementations may be slow and may fail.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
    fn model_id(&self) -> &str;
}

/// Deterministic local provider for tests and offline operation. Hashes the
/// input text so the same text always yields the same vector without a
/// real model.
pub struct DeterministicLocalProvider {
    dimension: usize,
    model_id: String,
}

impl DeterministicLocalProvider {
    pub fn new(dimension: usize, model_id: impl Into<String>) -> Self {
        Self {
            dimension,
            model_id: model_id.into(),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let bytes = text.as_bytes();
        (0..self.dimension)
            .map(|i| {
                let seed = bytes.iter().enumerate().fold(0u64, |acc, (j, b)| {
                    acc.wrapping_add((*b as u64).wrapping_mul((j + i + 1) as u64))
                });
                (((seed.wrapping_mul(2654435761).wrapping_add(i as u64 * 137)) % 1000) as f32
                    / 1000.0)
                    - 0.5
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicLocalProvider {
    async fn embed_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// HTTP-backed provider posting to an OpenAI-compatible `/embeddings`
/// endpoint. Response entries are sorted by index before returning so the
/// order-preservation contract holds regardless of server response order.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model_id: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            dimension,
        }
    }
}

#[derive(serde::Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(serde::Deserialize)]
struct EmbeddingResponseEntry {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingResponseEntry>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model_id,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EngineError::EmbeddingFailed {
                failed_indices: (0..texts.len()).collect(),
                total: texts.len(),
                source: e.into(),
            })?;

        let body: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EngineError::EmbeddingFailed {
                    failed_indices: (0..texts.len()).collect(),
                    total: texts.len(),
                    source: e.into(),
                })?;

        let mut entries = body.data;
        entries.sort_by_key(|e| e.index);
        Ok(entries.into_iter().map(|e| e.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
