//! Top-level engine configuration.
//!
//! Constructed programmatically and injected into [`crate::engine::Engine`]
//! at startup rather than read from a module-level singleton. Loading these
//! values from a config file or CLI flags is a thin external adapter outside
//! this crate's scope.

use std::time::Duration;

/// Pool sizing and lifecycle knobs for the [`crate::pool`] component.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub acquire_timeout: Duration,
    pub max_age: Duration,
    pub health_check_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: num_cpus::get().max(4),
            acquire_timeout: Duration::from_secs(5),
            max_age: Duration::from_secs(30 * 60),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

/// Capacity and persistence knobs for the embedding cache.
#[derive(Debug, Clone)]
pub struct EmbeddingCacheConfig {
    pub capacity: usize,
    pub persist_path: Option<std::path::PathBuf>,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            persist_path: None,
        }
    }
}

/// BM25 scoring knobs, defaults k1=1.5, b=0.75.
#[derive(Debug, Clone)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
    /// Number of mutations between from-scratch stats recomputation.
    pub recompute_after: u64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            recompute_after: 1_000,
        }
    }
}

/// Fusion strategy for the hybrid retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStrategy {
    /// Reciprocal Rank Fusion, the default strategy.
    ReciprocalRankFusion,
    /// Weighted linear combination of normalized scores.
    WeightedLinear,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub fusion: FusionStrategy,
    /// RRF rank-fusion constant, conventionally 60.
    pub rrf_c: f32,
    /// Weight given to the vector score when `fusion` is `WeightedLinear`.
    pub linear_alpha: f32,
    /// Multiplier applied to top-k' fan-out to each sub-retriever (k' = factor * k).
    pub fanout_factor: usize,
    pub fanout_cap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fusion: FusionStrategy::ReciprocalRankFusion,
            rrf_c: 60.0,
            linear_alpha: 0.5,
            fanout_factor: 2,
            fanout_cap: 200,
        }
    }
}

/// Root configuration for the engine. Every write-bearing operation checks
/// `read_only` before acquiring any resource.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub pool: PoolConfig,
    pub embedding_cache: EmbeddingCacheConfig,
    pub bm25: Bm25Config,
    pub retrieval: RetrievalConfig,
    /// Default deadline applied to every externally triggered operation.
    pub default_deadline: Duration,
    /// Global read-only switch, collapsed into a single top-level field
    /// rather than duplicated per store.
    pub read_only: bool,
    /// Cross-project search requires explicit opt-in.
    pub allow_cross_project_search: bool,
    /// Embedding vector dimension. Locked at first collection write;
    /// changing models requires an explicit migration, never silent
    /// coercion.
    pub vector_dimension: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            embedding_cache: EmbeddingCacheConfig::default(),
            bm25: Bm25Config::default(),
            retrieval: RetrievalConfig::default(),
            default_deadline: Duration::from_secs(30),
            read_only: false,
            allow_cross_project_search: false,
            vector_dimension: 384,
        }
    }
}
