//! Incremental Indexer: parses a file, embeds its units in one batch, and
//! fans the result out to the Vector Store, Call-Graph Store, BM25 Index,
//! and the local metadata store, in crash-safe order: *remove old → upsert
//! units → upsert call graph → update BM25 → update file table*. Concurrent
//! calls on the same path are serialized by a per-path lock, generalized
//! from a per-repository job-worker locking pattern but keyed on
//! `(project, path)` rather than a repository id.

pub mod file_table;
pub mod walk;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::bm25::Bm25Index;
use crate::callgraph::CallGraphStore;
use crate::embedding::EmbeddingService;
use crate::error::{EngineError, EngineResult};
use crate::metadata_store::MetadataStore;
use crate::model::{CodeUnit, FileTableEntry, FunctionNode, Memory, MemoryCategory, UnitKind};
use crate::parsing::{ParsedUnit, ParserRegistry};
use crate::vector_store::{Filter, VectorStore};

use file_table::{hash_content, needs_reindex};
use walk::{walk_files, WalkConfig};

/// Outcome of indexing a single file.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub path: String,
    pub skipped: bool,
    pub unit_count: usize,
    pub error: Option<String>,
}

/// Aggregate result of `index_directory`: a per-file outcome plus counts,
/// reflecting a "never halts a directory index" failure policy.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

pub type ProgressCallback<'a> = dyn Fn(&IndexOutcome) + Send + Sync + 'a;

/// Vector-store delete-by-filter has no unbounded mode; this caps the
/// number of prior points removed for one path in one `index_file` call.
/// A file producing more units than this in a single parse is pathological.
const MAX_UNITS_PER_FILE: usize = 100_000;

pub struct IncrementalIndexer {
    registry: Arc<ParserRegistry>,
    embeddings: Arc<EmbeddingService>,
    vector_store: Arc<VectorStore>,
    call_graph: Arc<CallGraphStore>,
    bm25: Arc<Bm25Index>,
    metadata: Arc<MetadataStore>,
    walk_config: WalkConfig,
    path_locks: DashMap<(String, String), Arc<tokio::sync::Mutex<()>>>,
}

impl IncrementalIndexer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ParserRegistry>,
        embeddings: Arc<EmbeddingService>,
        vector_store: Arc<VectorStore>,
        call_graph: Arc<CallGraphStore>,
        bm25: Arc<Bm25Index>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            registry,
            embeddings,
            vector_store,
            call_graph,
            bm25,
            metadata,
            walk_config: WalkConfig::default(),
            path_locks: DashMap::new(),
        }
    }

    fn path_lock(&self, project: &str, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.path_locks
            .entry((project.to_string(), path.to_string()))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Indexes `path` if its content hash differs from the recorded entry
    /// (or there is none); a no-op hash match is reported as `skipped`.
    #[instrument(skip(self))]
    pub async fn index_file(&self, project: &str, path: &str) -> EngineResult<IndexOutcome> {
        self.reindex_file(project, path, false).await
    }

    /// Like `index_file` but `force = true` re-indexes regardless of hash.
    #[instrument(skip(self))]
    pub async fn reindex_file(&self, project: &str, path: &str, force: bool) -> EngineResult<IndexOutcome> {
        let lock = self.path_lock(project, path);
        let _guard = lock.lock().await;

        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ParseError {
                path: path.to_string(),
                message: e.to_string(),
            }
        })?;
        let hash = hash_content(&content);

        let existing = self.metadata.get_file_entry(project, path).await?;
        if !needs_reindex(existing.as_ref(), &hash, force) {
            return Ok(IndexOutcome {
                path: path.to_string(),
                skipped: true,
                unit_count: existing.map(|e| e.unit_count).unwrap_or(0),
                error: None,
            });
        }

        let parsed = self.registry.parse(path, &content)?;
        if !parsed.errors.is_empty() {
            warn!(path, errors = ?parsed.errors, "parse produced errors; indexing recoverable units anyway");
        }

        let texts: Vec<String> = parsed.units.iter().map(|u| u.snippet.clone()).collect();
        let vectors = self.embeddings.embed(&texts).await?;

        let ids: Vec<Uuid> = (0..parsed.units.len()).map(|_| Uuid::new_v4()).collect();
        let code_units = build_code_units(project, path, parsed.language.name(), &parsed.units, &ids, vectors)?;

        // remove old -> upsert units -> upsert call graph -> update bm25 -> update file table
        self.remove_prior_units(project, path).await?;

        self.vector_store.upsert_code_units(&code_units).await?;

        let nodes = function_nodes(path, parsed.language.name(), &parsed.units);
        self.call_graph.upsert_nodes(project, nodes)?;
        self.call_graph.upsert_calls(project, parsed.calls)?;
        self.call_graph.upsert_implementations(project, parsed.implementations);

        for unit in &code_units {
            self.bm25.add(project, unit.memory.id, &unit.memory.content);
        }

        let entry = FileTableEntry {
            project: project.to_string(),
            path: path.to_string(),
            content_hash: hash,
            last_indexed: chrono::Utc::now(),
            unit_count: code_units.len(),
        };
        self.metadata.upsert_file_entry(&entry).await?;
        self.metadata.record_update(project).await?;

        Ok(IndexOutcome {
            path: path.to_string(),
            skipped: false,
            unit_count: code_units.len(),
            error: None,
        })
    }

    /// Removes every Vector Store point and call-graph entry previously
    /// recorded for `path`, and drops their BM25 documents. Idempotent: a
    /// path with nothing indexed yet is a no-op.
    async fn remove_prior_units(&self, project: &str, path: &str) -> EngineResult<()> {
        let filter = Filter::new().project(project).file_path(path);
        let page = self.vector_store.scroll(&filter, None, MAX_UNITS_PER_FILE).await?;
        for memory in &page.points {
            self.bm25.remove(project, memory.id);
        }
        self.vector_store.delete_by_filter(&filter, MAX_UNITS_PER_FILE).await?;
        self.call_graph.remove_for_file(project, path)?;
        Ok(())
    }

    /// Walks `root` and indexes every non-excluded file, continuing past
    /// per-file failures — a single failed file never halts a directory
    /// index. `progress` is invoked after each file outcome.
    #[instrument(skip(self, progress))]
    pub async fn index_directory(
        &self,
        project: &str,
        root: &Path,
        recursive: bool,
        progress: Option<&ProgressCallback<'_>>,
    ) -> EngineResult<DirectoryIndexReport> {
        let files = walk_files(root, recursive, &self.walk_config);
        let mut report = DirectoryIndexReport::default();

        for file in files {
            let path = file.to_string_lossy().to_string();
            let outcome = match self.index_file(project, &path).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    report.failed.push((path.clone(), err.to_string()));
                    let outcome = IndexOutcome {
                        path: path.clone(),
                        skipped: false,
                        unit_count: 0,
                        error: Some(err.to_string()),
                    };
                    if let Some(cb) = progress {
                        cb(&outcome);
                    }
                    continue;
                }
            };

            if outcome.skipped {
                report.skipped += 1;
            } else {
                report.indexed += 1;
            }
            if let Some(cb) = progress {
                cb(&outcome);
            }
        }

        info!(project, indexed = report.indexed, skipped = report.skipped, failed = report.failed.len(), "directory index complete");
        Ok(report)
    }

    /// Removes every trace of `project`: Vector Store points, call-graph
    /// entries, BM25 documents, and the file table. Idempotent.
    #[instrument(skip(self))]
    pub async fn delete_project(&self, project: &str) -> EngineResult<()> {
        let filter = Filter::new().project(project);
        self.vector_store.delete_by_filter(&filter, usize::MAX).await?;
        for entry in self.metadata.list_file_entries(project).await? {
            self.call_graph.remove_for_file(project, &entry.path)?;
        }
        self.bm25.clear_project(project);
        self.metadata.delete_project(project).await?;
        Ok(())
    }
}

fn build_code_units(
    project: &str,
    path: &str,
    language: &str,
    units: &[ParsedUnit],
    ids: &[Uuid],
    vectors: Vec<Vec<f32>>,
) -> EngineResult<Vec<CodeUnit>> {
    units
        .iter()
        .zip(ids.iter())
        .zip(vectors.into_iter())
        .map(|((unit, id), vector)| {
            let mut memory = Memory::new(
                unit.snippet.clone(),
                MemoryCategory::Code,
                0.5,
                Vec::<String>::new(),
                project.to_string(),
                vector,
            )?;
            memory.id = *id;
            memory.language = Some(language.to_string());
            Ok(CodeUnit {
                memory,
                file_path: path.to_string(),
                language: language.to_string(),
                kind: unit.kind,
                qualified_name: unit.qualified_name.clone(),
                start_line: unit.start_line,
                end_line: unit.end_line,
                source_snippet: unit.snippet.clone(),
            })
        })
        .collect()
}

fn function_nodes(path: &str, language: &str, units: &[ParsedUnit]) -> Vec<FunctionNode> {
    units
        .iter()
        .filter(|u| matches!(u.kind, UnitKind::Function | UnitKind::Method))
        .map(|u| FunctionNode {
            qualified_name: u.qualified_name.clone(),
            name: u.name.clone(),
            file_path: path.to_string(),
            language: language.to_string(),
            start_line: u.start_line,
            end_line: u.end_line,
            params: Vec::new(),
            return_type: None,
            is_exported: u.is_exported,
            is_async: false,
        })
        .collect()
}

/// An implicit deadline wrapper shared by every externally triggered
/// operation. Not used internally by `IncrementalIndexer` methods
/// themselves — the engine facade wraps calls into this module with it.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_nodes_excludes_classes_and_modules() {
        let units = vec![
            ParsedUnit {
                kind: UnitKind::Function,
                name: "f".into(),
                qualified_name: "a.rs::f".into(),
                start_line: 1,
                end_line: 2,
                snippet: "fn f() {}".into(),
                is_exported: true,
            },
            ParsedUnit {
                kind: UnitKind::Class,
                name: "C".into(),
                qualified_name: "a.rs::C".into(),
                start_line: 3,
                end_line: 10,
                snippet: "struct C;".into(),
                is_exported: true,
            },
        ];
        let nodes = function_nodes("a.rs", "rust", &units);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].qualified_name, "a.rs::f");
    }
}
