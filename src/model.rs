//! Core data model: `Memory`, `CodeUnit`, the call-graph's `FunctionNode`
//! and `CallSite`, `InterfaceImplementation`, and `Project`.
//!
//! Invariants are enforced at construction via small validated wrappers
//! (`ValidatedDocumentId`, `ValidatedTag`, `TimestampPair`) generalized from
//! document storage onto the memory/code-unit domain, returning
//! [`EngineError`] instead of `anyhow::Error` so validation failures surface
//! with a stable error taxonomy.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// An importance score constrained to `[0, 1]` at construction time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Importance(f32);

impl Importance {
    pub fn new(value: f32) -> EngineResult<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::validation(
                "importance",
                "must be within [0.0, 1.0]",
                value,
            ));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self(0.5)
    }
}

/// A non-empty, trimmed tag. Content equality only — case and whitespace
/// inside the trimmed value are significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    pub fn new(value: impl Into<String>) -> EngineResult<Self> {
        let trimmed = value.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(EngineError::validation(
                "tag",
                "must not be empty after trimming",
                "\"\"",
            ));
        }
        Ok(Self(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pair of timestamps enforcing `updated_at >= created_at` at every
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampPair {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimestampPair {
    pub fn new_now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance `updated_at` to `now`, preserving the invariant.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now >= self.created_at {
            now
        } else {
            self.created_at
        };
    }

    pub fn is_valid(&self) -> bool {
        self.updated_at >= self.created_at
    }
}

/// Closed category set for a [`Memory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Preference,
    Fact,
    Event,
    Workflow,
    Context,
    Code,
}

impl MemoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Preference => "preference",
            MemoryCategory::Fact => "fact",
            MemoryCategory::Event => "event",
            MemoryCategory::Workflow => "workflow",
            MemoryCategory::Context => "context",
            MemoryCategory::Code => "code",
        }
    }

    pub fn parse(s: &str) -> EngineResult<Self> {
        match s {
            "preference" => Ok(MemoryCategory::Preference),
            "fact" => Ok(MemoryCategory::Fact),
            "event" => Ok(MemoryCategory::Event),
            "workflow" => Ok(MemoryCategory::Workflow),
            "context" => Ok(MemoryCategory::Context),
            "code" => Ok(MemoryCategory::Code),
            other => Err(EngineError::validation(
                "category",
                "must be one of preference, fact, event, workflow, context, code",
                other,
            )),
        }
    }
}

/// Activity-based lifecycle state. Affects retrieval weighting (see
/// `crate::retrieval::fusion`) but never deletes data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Recent,
    Archived,
    Stale,
}

impl LifecycleState {
    /// Post-multiplication weighting factor used by the hybrid retriever.
    pub fn weight(&self) -> f32 {
        match self {
            LifecycleState::Active => 1.0,
            LifecycleState::Recent => 0.7,
            LifecycleState::Archived => 0.3,
            LifecycleState::Stale => 0.1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Recent => "recent",
            LifecycleState::Archived => "archived",
            LifecycleState::Stale => "stale",
        }
    }
}

/// Thresholds (in days since `last_accessed`) governing the Memory lifecycle
/// state machine. Not user-configurable per file, but kept as named
/// constants so the transition logic reads as a single source of truth.
pub struct LifecycleThresholds {
    pub recent_after_days: i64,
    pub archived_after_days: i64,
    pub stale_after_days: i64,
}

impl Default for LifecycleThresholds {
    fn default() -> Self {
        Self {
            recent_after_days: 7,
            archived_after_days: 30,
            stale_after_days: 90,
        }
    }
}

/// Compute the lifecycle state implied by elapsed time since last access.
pub fn lifecycle_for_elapsed(days_since_access: i64, thresholds: &LifecycleThresholds) -> LifecycleState {
    if days_since_access >= thresholds.stale_after_days {
        LifecycleState::Stale
    } else if days_since_access >= thresholds.archived_after_days {
        LifecycleState::Archived
    } else if days_since_access >= thresholds.recent_after_days {
        LifecycleState::Recent
    } else {
        LifecycleState::Active
    }
}

/// A stored memory: a free-text note with category, tags, importance, and
/// an embedding vector, namespaced to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    pub category: MemoryCategory,
    pub importance: Importance,
    pub tags: BTreeSet<Tag>,
    pub project: String,
    pub timestamps: TimestampPair,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    pub lifecycle: LifecycleState,
    pub embedding: Vec<f32>,
    /// Set for code-backed memories built via `CodeUnit`; `None` for
    /// plain stored memories.
    pub language: Option<String>,
}

impl Memory {
    /// Construct a new memory ready to be stored. `store()` assigns the id
    /// and timestamps; this validates the caller-supplied fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        content: impl Into<String>,
        category: MemoryCategory,
        importance: f32,
        tags: impl IntoIterator<Item = String>,
        project: impl Into<String>,
        embedding: Vec<f32>,
    ) -> EngineResult<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(EngineError::validation("content", "must not be empty", "\"\""));
        }
        let project = project.into();
        if project.trim().is_empty() {
            return Err(EngineError::validation("project", "must not be empty", "\"\""));
        }
        let tags = tags
            .into_iter()
            .map(Tag::new)
            .collect::<EngineResult<BTreeSet<_>>>()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            content,
            category,
            importance: Importance::new(importance)?,
            tags,
            project,
            timestamps: TimestampPair::new_now(),
            access_count: 0,
            last_accessed: now,
            lifecycle: LifecycleState::Active,
            embedding,
            language: None,
        })
    }

    /// Invariant check used by property tests: importance in range,
    /// timestamps ordered, embedding dimension matches, category in the
    /// closed set (guaranteed already by the `MemoryCategory` type).
    pub fn check_invariants(&self, expected_dim: usize) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.importance.get()) {
            return Err(EngineError::internal("importance escaped [0,1] after construction"));
        }
        if !self.timestamps.is_valid() {
            return Err(EngineError::internal("updated_at < created_at"));
        }
        if self.embedding.len() != expected_dim {
            return Err(EngineError::DimensionMismatch {
                configured: expected_dim,
                actual: self.embedding.len(),
            });
        }
        Ok(())
    }
}

/// Kind of semantic unit a [`CodeUnit`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Function,
    Method,
    Class,
    Module,
}

/// A `Memory` subtype describing a parsed semantic unit of source code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeUnit {
    pub memory: Memory,
    pub file_path: String,
    pub language: String,
    pub kind: UnitKind,
    pub qualified_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub source_snippet: String,
}

/// A node in the call graph: one per qualified name per project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionNode {
    pub qualified_name: String,
    pub name: String,
    pub file_path: String,
    pub language: String,
    pub start_line: usize,
    pub end_line: usize,
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub is_exported: bool,
    pub is_async: bool,
}

/// The syntactic kind of a call expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Direct,
    Method,
    Constructor,
    Lambda,
}

/// A directed call edge from a caller's qualified name to a callee's.
/// The callee may not resolve to a node in the same project — external
/// calls are permitted and simply have no matching `FunctionNode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub caller_qname: String,
    pub callee_qname: String,
    pub caller_file: String,
    pub caller_line: usize,
    pub kind: CallKind,
}

/// One base/interface a concrete class implements, with the methods the
/// class provides for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceImplementation {
    pub interface_qname: String,
    pub concrete_qname: String,
    pub methods: Vec<String>,
}

/// Project activity state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    #[default]
    Active,
    Paused,
    Archived,
}

/// A single row of a project's file table: the source of truth for
/// incremental indexing decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTableEntry {
    pub project: String,
    pub path: String,
    pub content_hash: String,
    pub last_indexed: DateTime<Utc>,
    pub unit_count: usize,
}

/// Per-project activity counters and state, independent of the file table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStats {
    pub project: String,
    pub searches: u64,
    pub updates: u64,
    pub state: ProjectState,
}

impl ProjectStats {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            searches: 0,
            updates: 0,
            state: ProjectState::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_out_of_range_is_rejected() {
        assert!(Importance::new(1.5).is_err());
        assert!(Importance::new(-0.1).is_err());
        assert!(Importance::new(0.0).is_ok());
        assert!(Importance::new(1.0).is_ok());
    }

    #[test]
    fn tag_trims_and_rejects_empty() {
        let t = Tag::new("  rust  ").unwrap();
        assert_eq!(t.as_str(), "rust");
        assert!(Tag::new("   ").is_err());
    }

    #[test]
    fn timestamp_pair_touch_never_regresses() {
        let mut ts = TimestampPair::new_now();
        let created = ts.created_at;
        ts.touch();
        assert!(ts.updated_at >= created);
        assert!(ts.is_valid());
    }

    #[test]
    fn memory_new_validates_fields() {
        let m = Memory::new(
            "prefers tabs over spaces",
            MemoryCategory::Preference,
            0.8,
            vec!["style".to_string()],
            "proj-a",
            vec![0.1, 0.2, 0.3],
        )
        .unwrap();
        assert!(m.check_invariants(3).is_ok());
        assert!(Memory::new("", MemoryCategory::Fact, 0.5, vec![], "p", vec![]).is_err());
    }

    #[test]
    fn lifecycle_thresholds_step_through_states() {
        let th = LifecycleThresholds::default();
        assert_eq!(lifecycle_for_elapsed(0, &th), LifecycleState::Active);
        assert_eq!(lifecycle_for_elapsed(10, &th), LifecycleState::Recent);
        assert_eq!(lifecycle_for_elapsed(40, &th), LifecycleState::Archived);
        assert_eq!(lifecycle_for_elapsed(100, &th), LifecycleState::Stale);
    }

    #[test]
    fn lifecycle_weights_match_spec() {
        assert_eq!(LifecycleState::Active.weight(), 1.0);
        assert_eq!(LifecycleState::Recent.weight(), 0.7);
        assert_eq!(LifecycleState::Archived.weight(), 0.3);
        assert_eq!(LifecycleState::Stale.weight(), 0.1);
    }
}
