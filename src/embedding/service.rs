//! Generator: `embed(texts, model) -> vectors`, cache-first, with partial
//! cache hits only batching the missed texts to the provider.

use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

use super::cache::EmbeddingCache;
use super::provider::EmbeddingProvider;

pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<EmbeddingCache>) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// `embed_batch([])` returns `[]` without calling the model.
    pub async fn embed(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.provider.model_id().to_string();
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(text, &model) {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    misses.push((i, text.clone()));
                }
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            match self.provider.embed_batch(&miss_texts).await {
                Ok(vectors) => {
                    for ((idx, text), vector) in misses.iter().zip(vectors.into_iter()) {
                        self.cache.put(text, &model, vector.clone());
                        results[*idx] = Some(vector);
                    }
                }
                Err(source) => {
                    let failed_indices: Vec<usize> = misses.iter().map(|(i, _)| *i).collect();
                    return Err(EngineError::EmbeddingFailed {
                        total: texts.len(),
                        failed_indices,
                        source: anyhow::anyhow!(source),
                    });
                }
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| EngineError::internal(format!("embedding {i} unresolved after batch fill")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::provider::DeterministicLocalProvider;

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let svc = EmbeddingService::new(
            Arc::new(DeterministicLocalProvider::new(4, "local")),
            Arc::new(EmbeddingCache::new(8)),
        );
        assert_eq!(svc.embed(&[]).await.unwrap(), Vec::<Vec<f32>>::new());
    }

    #[tokio::test]
    async fn repeated_text_is_served_from_cache() {
        let svc = EmbeddingService::new(
            Arc::new(DeterministicLocalProvider::new(4, "local")),
            Arc::new(EmbeddingCache::new(8)),
        );
        let texts = vec!["alpha".to_string(), "alpha".to_string(), "beta".to_string()];
        let out = svc.embed(&texts).await.unwrap();
        assert_eq!(out[0], out[1]);
        assert_eq!(svc.cache().len(), 2);
    }

    #[tokio::test]
    async fn partial_cache_hit_only_batches_misses() {
        let svc = EmbeddingService::new(
            Arc::new(DeterministicLocalProvider::new(4, "local")),
            Arc::new(EmbeddingCache::new(8)),
        );
        svc.embed(&["cached".to_string()]).await.unwrap();
        assert_eq!(svc.cache().len(), 1);
        let out = svc
            .embed(&["cached".to_string(), "new".to_string()])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(svc.cache().len(), 2);
    }
}
