//! Embedding cache + generator component.

pub mod cache;
pub mod provider;
pub mod service;

pub use cache::{CacheKey, EmbeddingCache};
pub use provider::{DeterministicLocalProvider, EmbeddingProvider, HttpEmbeddingProvider};
pub use service::EmbeddingService;
