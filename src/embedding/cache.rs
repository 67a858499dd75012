//! Content-addressable, LRU-evicted cache in front of the embedding
//! provider.
//!
//! Replaces an unbounded `HashMap<String, Vec<f32>>` keyed by raw text with
//! a `(sha256(text), model_identifier)` cache key. Eviction is
//! strict-recency LRU with a configurable capacity, guarded by a single
//! lock for thread-safe eviction.

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;

/// `(sha256(text), model_identifier)` — content equality only; whitespace
/// and case are significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text_hash: [u8; 32],
    model: String,
}

impl CacheKey {
    pub fn new(text: &str, model: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        let mut text_hash = [0u8; 32];
        text_hash.copy_from_slice(&digest);
        Self {
            text_hash,
            model: model.to_string(),
        }
    }
}

/// Thread-safe LRU cache mapping `(sha256, model)` to an embedding vector.
pub struct EmbeddingCache {
    inner: Mutex<LruCache<CacheKey, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
        self.inner.lock().get(&CacheKey::new(text, model)).cloned()
    }

    pub fn put(&self, text: &str, model: &str, embedding: Vec<f32>) {
        self.inner.lock().put(CacheKey::new(text, model), embedding);
    }

    /// Invalidate a cached entry. Callers must invoke this before updating a
    /// `Memory`'s content, or unconditionally regenerate, so the vector
    /// stored with a `Memory` always corresponds to its current content.
    pub fn invalidate(&self, text: &str, model: &str) {
        self.inner.lock().pop(&CacheKey::new(text, model));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_and_model_hits_cache() {
        let cache = EmbeddingCache::new(8);
        cache.put("hello world", "model-a", vec![1.0, 2.0]);
        assert_eq!(cache.get("hello world", "model-a"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn whitespace_and_case_are_significant() {
        let cache = EmbeddingCache::new(8);
        cache.put("Hello", "model-a", vec![1.0]);
        assert_eq!(cache.get("hello", "model-a"), None);
        assert_eq!(cache.get("Hello ", "model-a"), None);
    }

    #[test]
    fn different_model_is_a_different_entry() {
        let cache = EmbeddingCache::new(8);
        cache.put("x", "model-a", vec![1.0]);
        assert_eq!(cache.get("x", "model-b"), None);
    }

    #[test]
    fn lru_eviction_drops_least_recently_used() {
        let cache = EmbeddingCache::new(2);
        cache.put("a", "m", vec![1.0]);
        cache.put("b", "m", vec![2.0]);
        cache.put("c", "m", vec![3.0]);
        assert_eq!(cache.get("a", "m"), None);
        assert_eq!(cache.get("b", "m"), Some(vec![2.0]));
        assert_eq!(cache.get("c", "m"), Some(vec![3.0]));
    }

    #[test]
    fn invalidate_forces_regeneration() {
        let cache = EmbeddingCache::new(8);
        cache.put("x", "m", vec![1.0]);
        cache.invalidate("x", "m");
        assert_eq!(cache.get("x", "m"), None);
    }
}
