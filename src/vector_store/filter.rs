//! The structured filter language shared by the Vector Store, BM25 Index,
//! and Hybrid Retriever. Conjunctions of equality on categorical fields,
//! set membership for tags, range predicates for numeric fields, and
//! negation for exclusion. The Vector Store pushes filters to the backend
//! unchanged via `to_qdrant`; the BM25 Index has no predicate evaluator of
//! its own, so `matches` gives the Hybrid Retriever a client-side check to
//! re-verify BM25-sourced hits against the same filter.

use qdrant_client::qdrant::{Condition, FieldCondition, Filter as QdrantFilter, Match, Range};

use crate::model::Memory;

/// A single filter predicate.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Field equals this value exactly (project, category, language, lifecycle_state).
    Equals { field: String, value: String },
    /// Tags set contains this value.
    TagContains(String),
    /// Numeric field within `[min, max]` (either bound optional).
    Range {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
    },
}

/// A conjunction of predicates, with an optional set excluded by negation.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub must: Vec<Predicate>,
    pub must_not: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.must.push(Predicate::Equals {
            field: "project".into(),
            value: project.into(),
        });
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.must.push(Predicate::Equals {
            field: "category".into(),
            value: category.into(),
        });
        self
    }

    pub fn file_path(mut self, file_path: impl Into<String>) -> Self {
        self.must.push(Predicate::Equals {
            field: "file_path".into(),
            value: file_path.into(),
        });
        self
    }

    pub fn lifecycle_state(mut self, state: impl Into<String>) -> Self {
        self.must.push(Predicate::Equals {
            field: "lifecycle_state".into(),
            value: state.into(),
        });
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.must.push(Predicate::TagContains(tag.into()));
        self
    }

    pub fn importance_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.must.push(Predicate::Range {
            field: "importance".into(),
            min,
            max,
        });
        self
    }

    pub fn exclude(mut self, predicate: Predicate) -> Self {
        self.must_not.push(predicate);
        self
    }

    fn condition(predicate: &Predicate) -> Condition {
        match predicate {
            Predicate::Equals { field, value } => Condition::matches(field.clone(), value.clone()),
            Predicate::TagContains(tag) => Condition::matches(
                "tags",
                Match {
                    match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                        tag.clone(),
                    )),
                },
            ),
            Predicate::Range { field, min, max } => Condition::from(FieldCondition {
                key: field.clone(),
                range: Some(Range {
                    gte: *min,
                    lte: *max,
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    /// Translate this filter into the qdrant wire representation unchanged
    /// — the backend evaluates it, never a client-side pass.
    pub fn to_qdrant(&self) -> QdrantFilter {
        QdrantFilter {
            must: self.must.iter().map(Self::condition).collect(),
            must_not: self.must_not.iter().map(Self::condition).collect(),
            ..Default::default()
        }
    }

    /// Whether this filter matches the pinned project only — used to
    /// enforce the cross-project-search consent rule.
    pub fn is_pinned_to_single_project(&self) -> bool {
        self.must
            .iter()
            .any(|p| matches!(p, Predicate::Equals { field, .. } if field == "project"))
    }

    /// Client-side evaluation against an already-loaded `Memory`. The BM25
    /// Index has no way to evaluate structured predicates itself, so the
    /// Hybrid Retriever uses this to re-check BM25-sourced hits before
    /// fusing them in; the Vector Store's own searches still push `self`
    /// down via `to_qdrant` and never call this.
    pub fn matches(&self, memory: &Memory) -> bool {
        self.must.iter().all(|p| Self::predicate_matches(p, memory))
            && self.must_not.iter().all(|p| !Self::predicate_matches(p, memory))
    }

    fn predicate_matches(predicate: &Predicate, memory: &Memory) -> bool {
        match predicate {
            Predicate::Equals { field, value } => match field.as_str() {
                "project" => &memory.project == value,
                "category" => memory.category.as_str() == value,
                "lifecycle_state" => memory.lifecycle.as_str() == value,
                "language" => memory.language.as_deref() == Some(value.as_str()),
                // Unrecognized or code-only fields (e.g. file_path isn't
                // carried on `Memory`) can't be verified client-side;
                // fail closed rather than risk leaking a filtered-out hit.
                _ => false,
            },
            Predicate::TagContains(tag) => memory.tags.iter().any(|t| t.as_str() == tag),
            Predicate::Range { field, min, max } => match field.as_str() {
                "importance" => {
                    let v = memory.importance.get() as f64;
                    min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m)
                }
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_expected_predicate_count() {
        let f = Filter::new()
            .project("proj-a")
            .category("fact")
            .tag("rust")
            .importance_range(Some(0.2), None);
        assert_eq!(f.must.len(), 4);
        assert!(f.is_pinned_to_single_project());
    }

    #[test]
    fn unpinned_filter_is_detected() {
        let f = Filter::new().category("fact");
        assert!(!f.is_pinned_to_single_project());
    }

    fn sample_memory(category: crate::model::MemoryCategory, tag: &str) -> Memory {
        Memory::new("some text", category, 0.5, vec![tag.to_string()], "proj-a", vec![0.0; 3]).unwrap()
    }

    #[test]
    fn matches_checks_category_and_tag() {
        let f = Filter::new().category("fact").tag("rust");
        assert!(f.matches(&sample_memory(crate::model::MemoryCategory::Fact, "rust")));
        assert!(!f.matches(&sample_memory(crate::model::MemoryCategory::Event, "rust")));
        assert!(!f.matches(&sample_memory(crate::model::MemoryCategory::Fact, "go")));
    }

    #[test]
    fn matches_fails_closed_on_unsupported_field() {
        let f = Filter::new().file_path("src/main.rs");
        assert!(!f.matches(&sample_memory(crate::model::MemoryCategory::Code, "rust")));
    }

    #[test]
    fn matches_honors_exclusion() {
        let f = Filter::new().exclude(Predicate::TagContains("rust".into()));
        assert!(!f.matches(&sample_memory(crate::model::MemoryCategory::Fact, "rust")));
        assert!(f.matches(&sample_memory(crate::model::MemoryCategory::Fact, "go")));
    }
}
