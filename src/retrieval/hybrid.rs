//! Hybrid Retriever: fuses a vector-store k-NN search with a BM25 query
//! under the same structured filter.
//!
//! Orchestration shape — embed once, fan out to both sub-retrievers, fuse,
//! re-rank — follows a `tokio::try_join!`-over-two-independent-searches
//! pattern adapted from recent+semantic fusion to vector+BM25 RRF fusion.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::bm25::Bm25Index;
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingService;
use crate::error::EngineResult;
use crate::model::Memory;
use crate::vector_store::{Filter, VectorStore};

use super::fusion::{fuse, rank_map_normalized, RankedHit};

pub struct HybridSearchHit {
    pub memory: Memory,
    pub score: f32,
}

pub struct HybridRetriever {
    vector_store: Arc<VectorStore>,
    bm25: Arc<Bm25Index>,
    embeddings: Arc<EmbeddingService>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        vector_store: Arc<VectorStore>,
        bm25: Arc<Bm25Index>,
        embeddings: Arc<EmbeddingService>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            vector_store,
            bm25,
            embeddings,
            config,
        }
    }

    pub async fn search(
        &self,
        project: &str,
        query_text: &str,
        filter: &Filter,
        k: usize,
    ) -> EngineResult<Vec<HybridSearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let k_prime = (self.config.fanout_factor * k).min(self.config.fanout_cap);

        let query_vectors = self.embeddings.embed(&[query_text.to_string()]).await?;
        let query_vector = query_vectors.into_iter().next().unwrap_or_default();

        let (vector_hits, bm25_hits) = tokio::join!(
            self.vector_store.search(query_vector, filter, k_prime),
            async { self.bm25.query(project, query_text, k_prime) }
        );
        let vector_hits = vector_hits?;

        let mut by_id: HashMap<Uuid, Memory> = HashMap::new();
        let vector_scores: Vec<(Uuid, f32)> = vector_hits
            .iter()
            .map(|hit| {
                by_id.insert(hit.memory.id, hit.memory.clone());
                (hit.memory.id, hit.score)
            })
            .collect();

        // Vector hits already satisfy `filter` (applied server-side). BM25
        // has no predicate evaluator of its own, so any hit not already
        // known from the vector side must be fetched and re-checked against
        // `filter` before it's allowed into the fused ranking.
        let mut bm25_scores: Vec<(Uuid, f32)> = Vec::with_capacity(bm25_hits.len());
        for (id, score) in &bm25_hits {
            if by_id.contains_key(id) {
                bm25_scores.push((*id, *score as f32));
                continue;
            }
            if let Ok(memory) = self.vector_store.retrieve(*id).await {
                if filter.matches(&memory) {
                    by_id.insert(*id, memory);
                    bm25_scores.push((*id, *score as f32));
                }
            }
        }

        let vector_ranking: HashMap<Uuid, RankedHit> = vector_scores
            .iter()
            .enumerate()
            .map(|(rank, (id, score))| (*id, RankedHit { rank, score: *score }))
            .collect();
        let bm25_ranking = rank_map_normalized(&bm25_scores);

        let lifecycle = by_id.iter().map(|(id, m)| (*id, m.lifecycle)).collect();

        let fused = fuse(
            &vector_ranking,
            &bm25_ranking,
            &lifecycle,
            self.config.fusion,
            self.config.rrf_c,
            self.config.linear_alpha,
            k,
        );

        Ok(fused
            .into_iter()
            .filter_map(|hit| {
                by_id.get(&hit.id).map(|memory| HybridSearchHit {
                    memory: memory.clone(),
                    score: hit.fused_score,
                })
            })
            .collect())
    }
}
