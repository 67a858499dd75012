//! Rank fusion strategies combining a vector ranking and a BM25 ranking
//! into one ordered result set.
//!
//! `reciprocal_rank_fusion` follows a `fuse_results_with_names`-style
//! scheme (`score = Σ weight / (RRF_K + rank + 1)` over each sub-ranking,
//! entity union via id) generalized from several weighted sources down to
//! two equally-weighted rankings (vector, bm25) with constant `C=60`.

use std::collections::HashMap;

use uuid::Uuid;

use crate::config::FusionStrategy;
use crate::model::LifecycleState;

/// A single document's position and raw score in one sub-ranking.
#[derive(Debug, Clone, Copy)]
pub struct RankedHit {
    pub rank: usize,
    pub score: f32,
}

/// Final fused result: a document id with its combined score and the
/// lifecycle weight already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: Uuid,
    pub fused_score: f32,
    pub vector_score: Option<f32>,
}

pub fn fuse(
    vector_ranking: &HashMap<Uuid, RankedHit>,
    bm25_ranking: &HashMap<Uuid, RankedHit>,
    lifecycle: &HashMap<Uuid, LifecycleState>,
    strategy: FusionStrategy,
    rrf_c: f32,
    linear_alpha: f32,
    k: usize,
) -> Vec<FusedHit> {
    let mut ids: Vec<Uuid> = vector_ranking.keys().chain(bm25_ranking.keys()).copied().collect();
    ids.sort();
    ids.dedup();

    let mut hits: Vec<FusedHit> = ids
        .into_iter()
        .map(|id| {
            let base = match strategy {
                FusionStrategy::ReciprocalRankFusion => {
                    reciprocal_rank_fusion_score(vector_ranking.get(&id), bm25_ranking.get(&id), rrf_c)
                }
                FusionStrategy::WeightedLinear => {
                    weighted_linear_score(vector_ranking.get(&id), bm25_ranking.get(&id), linear_alpha)
                }
            };
            let weight = lifecycle.get(&id).copied().unwrap_or(LifecycleState::Active).weight();
            FusedHit {
                id,
                fused_score: base * weight,
                vector_score: vector_ranking.get(&id).map(|h| h.score),
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.vector_score
                    .partial_cmp(&a.vector_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}

fn reciprocal_rank_fusion_score(vector: Option<&RankedHit>, bm25: Option<&RankedHit>, c: f32) -> f32 {
    let v = vector.map(|h| 1.0 / (c + h.rank as f32 + 1.0)).unwrap_or(0.0);
    let b = bm25.map(|h| 1.0 / (c + h.rank as f32 + 1.0)).unwrap_or(0.0);
    v + b
}

/// Both sub-scores are normalized to `[0, 1]` within their own ranking
/// before combining, since vector cosine similarity and BM25 scores live on
/// unrelated scales.
fn weighted_linear_score(vector: Option<&RankedHit>, bm25: Option<&RankedHit>, alpha: f32) -> f32 {
    let v = vector.map(|h| h.score).unwrap_or(0.0);
    let b = bm25.map(|h| h.score).unwrap_or(0.0);
    alpha * v + (1.0 - alpha) * b
}

/// Build a rank map (`id -> (rank, score)`) from a results list already
/// ordered best-first, normalizing BM25's unbounded scores to `[0, 1]` by
/// dividing by the top score (0 if the ranking is empty).
pub fn rank_map_normalized(results: &[(Uuid, f32)]) -> HashMap<Uuid, RankedHit> {
    let max = results.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max);
    results
        .iter()
        .enumerate()
        .map(|(rank, (id, score))| {
            let normalized = if max > 0.0 { score / max } else { 0.0 };
            (*id, RankedHit { rank, score: normalized })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_prefers_document_ranked_well_in_both_sources() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let vector = HashMap::from([(a, RankedHit { rank: 0, score: 0.9 }), (b, RankedHit { rank: 5, score: 0.5 })]);
        let bm25 = HashMap::from([(a, RankedHit { rank: 0, score: 0.8 }), (b, RankedHit { rank: 1, score: 0.6 })]);
        let lifecycle = HashMap::from([(a, LifecycleState::Active), (b, LifecycleState::Active)]);
        let fused = fuse(&vector, &bm25, &lifecycle, FusionStrategy::ReciprocalRankFusion, 60.0, 0.5, 10);
        assert_eq!(fused[0].id, a);
    }

    #[test]
    fn stale_lifecycle_is_downweighted() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let vector = HashMap::from([(a, RankedHit { rank: 0, score: 1.0 }), (b, RankedHit { rank: 0, score: 1.0 })]);
        let bm25 = HashMap::new();
        let lifecycle = HashMap::from([(a, LifecycleState::Stale), (b, LifecycleState::Active)]);
        let fused = fuse(&vector, &bm25, &lifecycle, FusionStrategy::ReciprocalRankFusion, 60.0, 0.5, 10);
        assert_eq!(fused[0].id, b);
    }

    #[test]
    fn ties_break_by_vector_score_then_id() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let vector = HashMap::new();
        let bm25 = HashMap::from([(lo, RankedHit { rank: 0, score: 0.5 }), (hi, RankedHit { rank: 0, score: 0.5 })]);
        let lifecycle = HashMap::new();
        let fused = fuse(&vector, &bm25, &lifecycle, FusionStrategy::ReciprocalRankFusion, 60.0, 0.5, 10);
        assert_eq!(fused[0].id, lo);
    }
}
