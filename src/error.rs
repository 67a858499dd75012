//! Typed error taxonomy for the engine's component boundaries.
//!
//! Errors are typed by kind, not message, so callers can branch on `EngineError`
//! variants instead of matching strings. Lower-level failures (I/O, client
//! errors from the vector DB, tree-sitter failures) are collected internally
//! with `anyhow::Context` and converted into one of these variants only when
//! they cross a public API boundary, preserving the original error as `source`.

use std::fmt;
use uuid::Uuid;

/// Stable error kind returned by every public operation.
///
/// Each variant carries the context needed to build an actionable message
/// (field name, affected id, observed vs. expected value) per the error
/// design's "short stable code + actionable message" requirement.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A lookup resolved to nothing. Never exceptional — callers decide policy.
    #[error("not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },

    /// Caller input violated a documented constraint.
    #[error("validation failed for field `{field}`: {message} (received: {received})")]
    Validation {
        field: &'static str,
        message: String,
        received: String,
    },

    /// No parser registered for the file's extension.
    #[error("unsupported language for extension `.{extension}`")]
    UnsupportedLanguage { extension: String },

    /// File failed to parse. Recoverable at the directory level.
    #[error("failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    /// File exceeded the implementation-chosen byte size threshold.
    #[error("file {path} ({size} bytes) exceeds the parse size limit of {limit} bytes")]
    ParseTooLarge {
        path: String,
        size: usize,
        limit: usize,
    },

    /// The embedding collaborator failed. Carries the indices of the texts
    /// that failed so callers can retry only those.
    #[error("embedding generation failed for {} of {} texts", failed_indices.len(), total)]
    EmbeddingFailed {
        failed_indices: Vec<usize>,
        total: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The vector database (or its client) reported a failure.
    #[error("storage error during {op}: {source}")]
    StorageError {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// An operation exceeded its deadline. Distinct from `StorageError` so
    /// callers can apply a different retry policy.
    #[error("operation {op} timed out after {elapsed_ms}ms")]
    Timeout { op: &'static str, elapsed_ms: u64 },

    /// The client pool could not satisfy an acquire within `acquire_timeout`.
    #[error(
        "connection pool exhausted ({active}/{max} connections in use); \
         raise max_size or reduce concurrency"
    )]
    PoolExhausted { active: usize, max: usize },

    /// The configured embedding dimension disagrees with the collection's
    /// dimension. Fatal until an administrator migrates the collection.
    #[error("vector dimension mismatch: configured {configured}, collection has {actual}")]
    DimensionMismatch { configured: usize, actual: usize },

    /// A write-bearing operation was attempted while the engine is in
    /// read-only mode.
    #[error("operation {op} rejected: engine is in read-only mode")]
    ReadOnly { op: &'static str },

    /// An invariant was violated. Should never occur; surfaced verbatim to
    /// aid debugging rather than masked behind a generic message.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>, received: impl fmt::Display) -> Self {
        EngineError::Validation {
            field,
            message: message.into(),
            received: received.to_string(),
        }
    }

    pub fn storage(op: &'static str, source: impl Into<anyhow::Error>) -> Self {
        EngineError::StorageError {
            op,
            source: source.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    /// Stable machine-readable code, independent of the Display message.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::Validation { .. } => "validation",
            EngineError::UnsupportedLanguage { .. } => "unsupported_language",
            EngineError::ParseError { .. } => "parse_error",
            EngineError::ParseTooLarge { .. } => "parse_too_large",
            EngineError::EmbeddingFailed { .. } => "embedding_failed",
            EngineError::StorageError { .. } => "storage_error",
            EngineError::Timeout { .. } => "timeout",
            EngineError::PoolExhausted { .. } => "pool_exhausted",
            EngineError::DimensionMismatch { .. } => "dimension_mismatch",
            EngineError::ReadOnly { .. } => "read_only",
            EngineError::Internal(_) => "internal",
        }
    }

    /// Whether a caller may reasonably retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout { .. }
                | EngineError::PoolExhausted { .. }
                | EngineError::EmbeddingFailed { .. }
        )
    }
}

/// Convenience alias used throughout the crate's public API.
pub type EngineResult<T> = Result<T, EngineError>;

/// Helper for [`EngineError::not_found`] keyed by a [`Uuid`].
pub fn not_found_uuid(kind: &'static str, id: Uuid) -> EngineError {
    EngineError::not_found(kind, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_spec() {
        assert!(EngineError::Timeout { op: "search", elapsed_ms: 30_000 }.is_retryable());
        assert!(EngineError::PoolExhausted { active: 10, max: 10 }.is_retryable());
        assert!(!EngineError::ReadOnly { op: "store" }.is_retryable());
        assert!(!EngineError::NotFound { kind: "memory", id: "x".into() }.is_retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::not_found("memory", "abc").code(), "not_found");
        assert_eq!(
            EngineError::DimensionMismatch { configured: 384, actual: 768 }.code(),
            "dimension_mismatch"
        );
    }
}
