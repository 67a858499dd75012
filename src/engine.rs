//! Public API facade: the single entry point wiring the Vector Store, BM25
//! Index, Call-Graph Store, Embedding Service, metadata store, and
//! Incremental Indexer together, enforcing the cross-cutting policies that
//! belong to the core rather than any one collaborator — read-only mode,
//! implicit per-operation deadlines, and cross-project search consent.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use std::sync::Arc;
use uuid::Uuid;

use crate::bm25::Bm25Index;
use crate::callgraph::{CallGraphStore, PathHit};
use crate::config::EngineConfig;
use crate::embedding::EmbeddingService;
use crate::error::{EngineError, EngineResult};
use crate::indexer::{DirectoryIndexReport, IncrementalIndexer, IndexOutcome, ProgressCallback};
use crate::metadata_store::MetadataStore;
use crate::model::{Memory, MemoryCategory, ProjectState};
use crate::parsing::ParserRegistry;
use crate::pool::PoolMetrics;
use crate::retrieval::{HybridRetriever, HybridSearchHit};
use crate::vector_store::{Filter, ScrollPage, VectorStore};

/// Aggregate project status: activity counters from the metadata store
/// plus breakdowns over the project's indexed points (counts by category,
/// lifecycle, language). The breakdown is bounded by
/// `STATUS_SCAN_CAP` points; `truncated` is set when the project has more.
#[derive(Debug, Clone, Default)]
pub struct ProjectStatusSummary {
    pub project: String,
    pub searches: u64,
    pub updates: u64,
    pub state: ProjectState,
    pub total_points: usize,
    pub by_category: HashMap<String, usize>,
    pub by_lifecycle: HashMap<String, usize>,
    pub by_language: HashMap<String, usize>,
    pub truncated: bool,
}

const STATUS_SCAN_CAP: usize = 20_000;
const STATUS_SCAN_PAGE: usize = 500;

/// Combined liveness snapshot for external health checks.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub vector_store_reachable: bool,
    pub pool: PoolMetrics,
}

pub struct Engine {
    config: EngineConfig,
    vector_store: Arc<VectorStore>,
    bm25: Arc<Bm25Index>,
    call_graph: Arc<CallGraphStore>,
    embeddings: Arc<EmbeddingService>,
    metadata: Arc<MetadataStore>,
    indexer: Arc<IncrementalIndexer>,
    hybrid: HybridRetriever,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        vector_store: Arc<VectorStore>,
        bm25: Arc<Bm25Index>,
        call_graph: Arc<CallGraphStore>,
        embeddings: Arc<EmbeddingService>,
        metadata: Arc<MetadataStore>,
        registry: Arc<ParserRegistry>,
    ) -> Self {
        let indexer = Arc::new(IncrementalIndexer::new(
            registry,
            embeddings.clone(),
            vector_store.clone(),
            call_graph.clone(),
            bm25.clone(),
            metadata.clone(),
        ));
        let hybrid = HybridRetriever::new(
            vector_store.clone(),
            bm25.clone(),
            embeddings.clone(),
            config.retrieval.clone(),
        );
        Self {
            config,
            vector_store,
            bm25,
            call_graph,
            embeddings,
            metadata,
            indexer,
            hybrid,
        }
    }

    fn check_writable(&self, op: &'static str) -> EngineResult<()> {
        if self.config.read_only {
            return Err(EngineError::ReadOnly { op });
        }
        Ok(())
    }

    fn check_cross_project(&self, filter: &Filter) -> EngineResult<()> {
        if !filter.is_pinned_to_single_project() && !self.config.allow_cross_project_search {
            return Err(EngineError::validation(
                "filter",
                "cross-project search requires a project-pinned filter unless allow_cross_project_search is set",
                "unpinned filter",
            ));
        }
        Ok(())
    }

    async fn with_deadline<T>(&self, op: &'static str, fut: impl Future<Output = EngineResult<T>>) -> EngineResult<T> {
        match tokio::time::timeout(self.config.default_deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                op,
                elapsed_ms: self.config.default_deadline.as_millis() as u64,
            }),
        }
    }

    // ---- Memory CRUD ----------------------------------------------------

    pub async fn store(
        &self,
        content: impl Into<String>,
        category: MemoryCategory,
        importance: f32,
        tags: Vec<String>,
        project: impl Into<String>,
    ) -> EngineResult<Uuid> {
        self.check_writable("store")?;
        let project = project.into();
        let content = content.into();
        self.with_deadline("store", async {
            self.vector_store.ensure_collection().await?;
            let vectors = self.embeddings.embed(&[content.clone()]).await?;
            let vector = vectors.into_iter().next().unwrap_or_default();
            let memory = Memory::new(content, category, importance, tags, project.clone(), vector)?;
            memory.check_invariants(self.config.vector_dimension)?;
            self.vector_store.upsert(std::slice::from_ref(&memory)).await?;
            self.bm25.add(&project, memory.id, &memory.content);
            self.metadata.record_update(&project).await?;
            Ok(memory.id)
        })
        .await
    }

    pub async fn retrieve_by_id(&self, id: Uuid) -> EngineResult<Memory> {
        self.with_deadline("retrieve_by_id", self.vector_store.retrieve(id)).await
    }

    pub async fn retrieve(
        &self,
        project: &str,
        query_text: &str,
        filter: &Filter,
        k: usize,
    ) -> EngineResult<Vec<HybridSearchHit>> {
        self.check_cross_project(filter)?;
        self.metadata.record_search(project).await?;
        self.with_deadline("retrieve", self.hybrid.search(project, query_text, filter, k)).await
    }

    /// Apply `payload_patch` (a qdrant merge-patch) and, when `vector` is
    /// not already given, re-embed and replace the stored vector if the
    /// patch changes `content` — otherwise the vector and BM25 document
    /// would drift from the new text.
    pub async fn update(&self, id: Uuid, payload_patch: serde_json::Value, vector: Option<Vec<f32>>) -> EngineResult<()> {
        self.check_writable("update")?;
        self.with_deadline("update", async {
            let new_content = payload_patch
                .get("content")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let vector = match (vector, &new_content) {
                (Some(v), _) => Some(v),
                (None, Some(content)) => {
                    let vectors = self.embeddings.embed(&[content.clone()]).await?;
                    Some(vectors.into_iter().next().unwrap_or_default())
                }
                (None, None) => None,
            };
            self.vector_store.update(id, payload_patch, vector).await?;
            if let Some(content) = new_content {
                let memory = self.vector_store.retrieve(id).await?;
                self.bm25.update(&memory.project, id, &content);
            }
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.check_writable("delete")?;
        self.with_deadline("delete", async {
            match self.vector_store.retrieve(id).await {
                Ok(memory) => self.bm25.remove(&memory.project, id),
                Err(EngineError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            self.vector_store.delete(id).await
        })
        .await
    }

    pub async fn delete_by_filter(&self, filter: &Filter, max: usize) -> EngineResult<usize> {
        self.check_writable("delete_by_filter")?;
        self.check_cross_project(filter)?;
        self.with_deadline("delete_by_filter", self.vector_store.delete_by_filter(filter, max)).await
    }

    pub async fn list(&self, filter: &Filter, cursor: Option<String>, limit: usize) -> EngineResult<ScrollPage> {
        self.check_cross_project(filter)?;
        self.with_deadline("list", self.vector_store.scroll(filter, cursor, limit)).await
    }

    /// Rebuild the BM25 Index from the Vector Store's persisted payloads.
    /// The index lives in memory only; a caller should run this once
    /// after constructing an `Engine` against a pre-existing collection
    /// so memories stored in a prior process regain lexical coverage.
    pub async fn rebuild_bm25_index(&self) -> EngineResult<()> {
        let filter = Filter::new();
        let mut cursor = None;
        loop {
            let page = self.vector_store.scroll(&filter, cursor, STATUS_SCAN_PAGE).await?;
            let page_len = page.points.len();
            for memory in &page.points {
                self.bm25.add(&memory.project, memory.id, &memory.content);
            }
            cursor = page.next_cursor;
            if cursor.is_none() || page_len == 0 {
                break;
            }
        }
        Ok(())
    }

    // ---- Code indexing ---------------------------------------------------

    pub async fn index_file(&self, project: &str, path: &str) -> EngineResult<IndexOutcome> {
        self.check_writable("index_file")?;
        self.with_deadline("index_file", self.indexer.index_file(project, path)).await
    }

    pub async fn reindex(&self, project: &str, path: &str, force: bool) -> EngineResult<IndexOutcome> {
        self.check_writable("reindex")?;
        self.with_deadline("reindex", self.indexer.reindex_file(project, path, force)).await
    }

    pub async fn index_directory(
        &self,
        project: &str,
        root: &Path,
        recursive: bool,
        progress: Option<&ProgressCallback<'_>>,
    ) -> EngineResult<DirectoryIndexReport> {
        self.check_writable("index_directory")?;
        // A directory walk can legitimately run past the default single-op
        // deadline; it is itself a bounded sequence of deadline-wrapped
        // `index_file` calls, so no outer timeout is layered on top.
        self.indexer.index_directory(project, root, recursive, progress).await
    }

    pub async fn delete_project(&self, project: &str) -> EngineResult<()> {
        self.check_writable("delete_project")?;
        self.with_deadline("delete_project", self.indexer.delete_project(project)).await
    }

    // ---- Structural queries ----------------------------------------------
    // In-memory, lock-guarded, synchronous — no suspension points, so no
    // deadline wrapper applies.

    pub fn find_callers(&self, project: &str, qname: &str, depth: usize, limit: usize) -> Vec<PathHit> {
        self.call_graph.find_callers(project, qname, depth, limit)
    }

    pub fn find_callees(&self, project: &str, qname: &str, depth: usize, limit: usize) -> Vec<PathHit> {
        self.call_graph.find_callees(project, qname, depth, limit)
    }

    pub fn find_implementations(&self, project: &str, interface_qname: &str) -> Vec<crate::model::InterfaceImplementation> {
        self.call_graph.find_implementations(project, interface_qname)
    }

    pub fn find_dependencies(&self, project: &str, path: &str) -> Vec<String> {
        self.call_graph.file_dependencies(project, path)
    }

    pub fn find_dependents(&self, project: &str, path: &str) -> Vec<String> {
        self.call_graph.file_dependents(project, path)
    }

    pub fn get_call_chain(&self, project: &str, from_qname: &str, to_qname: &str, max_paths: usize, max_depth: usize) -> Vec<Vec<String>> {
        self.call_graph.find_chain(project, from_qname, to_qname, max_paths, max_depth)
    }

    // ---- Status ------------------------------------------------------------

    pub fn pool_metrics(&self) -> PoolMetrics {
        self.vector_store.pool_metrics()
    }

    pub async fn health(&self) -> HealthReport {
        let reachable = self.vector_store.scroll(&Filter::new(), None, 1).await.is_ok();
        HealthReport {
            vector_store_reachable: reachable,
            pool: self.vector_store.pool_metrics(),
        }
    }

    /// Bounded scan over the project's points, breaking counts down by
    /// category/lifecycle/language, merged with its activity counters.
    pub async fn project_stats(&self, project: &str) -> EngineResult<ProjectStatusSummary> {
        let stats = self.metadata.project_stats(project).await?;
        let mut summary = ProjectStatusSummary {
            project: project.to_string(),
            searches: stats.searches,
            updates: stats.updates,
            state: stats.state,
            ..Default::default()
        };

        let filter = Filter::new().project(project);
        let mut cursor = None;
        loop {
            let page = self.vector_store.scroll(&filter, cursor, STATUS_SCAN_PAGE).await?;
            let page_len = page.points.len();
            for memory in &page.points {
                summary.total_points += 1;
                *summary.by_category.entry(memory.category.as_str().to_string()).or_insert(0) += 1;
                *summary.by_lifecycle.entry(memory.lifecycle.as_str().to_string()).or_insert(0) += 1;
                if let Some(language) = &memory.language {
                    *summary.by_language.entry(language.clone()).or_insert(0) += 1;
                }
            }
            cursor = page.next_cursor;
            if cursor.is_none() || summary.total_points >= STATUS_SCAN_CAP || page_len == 0 {
                break;
            }
        }
        summary.truncated = cursor.is_some();

        Ok(summary)
    }

    pub fn bm25_doc_count(&self, project: &str) -> usize {
        self.bm25.doc_count(project)
    }
}
