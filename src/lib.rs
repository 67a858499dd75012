//! Code-and-memory retrieval engine: indexes source repositories and
//! free-form memories into a vector store and answers semantic and
//! structural queries over them (see `DESIGN.md` for the grounding ledger
//! behind each module).

pub mod bm25;
pub mod callgraph;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod metadata_store;
pub mod model;
pub mod observability;
pub mod parsing;
pub mod pool;
pub mod retrieval;
pub mod vector_store;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
