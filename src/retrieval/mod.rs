//! Hybrid Retriever component: fuses Vector Store and BM25
//! Index rankings, weighted by lifecycle state.

pub mod fusion;
pub mod hybrid;

pub use hybrid::{HybridRetriever, HybridSearchHit};
