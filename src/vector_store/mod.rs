//! Vector Store: CRUD and filtered search over a single named collection of
//! `(id, vector, payload)` points.
//!
//! Backed by the real `qdrant-client` crate rather than an in-process index
//! (`create_collection`, filtered `search`, `upsert_points`, `delete_points`
//! with a filter selector). Every operation leases a connection from the
//! [`crate::pool::ClientPool`] for its critical section only.

pub mod filter;
pub mod payload;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_config::Config as VectorsConfigEnum, CreateCollectionBuilder, Distance,
    GetPointsBuilder, PointId, PointsSelector, ScrollPointsBuilder, SearchPointsBuilder,
    SetPayloadPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::qdrant::{DeletePointsBuilder, PointsIdsList};
use qdrant_client::Qdrant;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::model::Memory;
use crate::pool::{ClientPool, Connection as PoolConnection};

pub use filter::{Filter, Predicate};

/// Distance metric backing similarity search. Cosine is the default;
/// implementation-chosen but documented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl From<DistanceMetric> for Distance {
    fn from(value: DistanceMetric) -> Self {
        match value {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Euclidean => Distance::Euclid,
            DistanceMetric::DotProduct => Distance::Dot,
        }
    }
}

/// A single pooled handle onto the qdrant client. `qdrant_client::Qdrant` is
/// itself a cheaply-cloneable gRPC channel wrapper; pooling distinct
/// instances still gives the engine a uniform acquire/release/health-check
/// discipline across every operation that talks to the vector database.
pub struct QdrantConnection {
    pub client: Qdrant,
}

#[async_trait]
impl PoolConnection for QdrantConnection {
    async fn health_check(&mut self) -> bool {
        // qdrant-client exposes no dedicated ping RPC; listing collections is
        // the cheapest round trip that exercises the channel.
        self.client.list_collections().await.is_ok()
    }
}

/// A search hit: the reconstructed `Memory` plus its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub memory: Memory,
    pub score: f32,
}

/// A page of a `scroll` listing.
pub struct ScrollPage {
    pub points: Vec<Memory>,
    pub next_cursor: Option<String>,
}

pub struct VectorStore {
    pool: ClientPool<QdrantConnection>,
    collection: String,
    dimension: usize,
    distance: DistanceMetric,
}

impl VectorStore {
    pub fn new(
        pool: ClientPool<QdrantConnection>,
        collection: impl Into<String>,
        dimension: usize,
        distance: DistanceMetric,
    ) -> Self {
        Self {
            pool,
            collection: collection.into(),
            dimension,
            distance,
        }
    }

    /// Create the collection lazily on first write. If an existing
    /// collection's dimension disagrees with the configured dimension, this
    /// surfaces `DimensionMismatch` rather than silently proceeding (spec
    /// §4.4 collection-lifecycle contract).
    pub async fn ensure_collection(&self) -> EngineResult<()> {
        let lease = self.pool.acquire().await?;
        let exists = lease
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| EngineError::storage("ensure_collection", e))?;
        if exists {
            let response = lease
                .client
                .collection_info(&self.collection)
                .await
                .map_err(|e| EngineError::storage("collection_info", e))?;
            let info = response
                .result
                .ok_or_else(|| EngineError::internal("collection_info returned no result"))?;
            if let Some(actual) = existing_dimension(&info) {
                if actual != self.dimension as u64 {
                    return Err(EngineError::DimensionMismatch {
                        configured: self.dimension,
                        actual: actual as usize,
                    });
                }
            }
            return Ok(());
        }

        lease
            .client
            .create_collection(CreateCollectionBuilder::new(&self.collection).vectors_config(
                VectorsConfig {
                    config: Some(VectorsConfigEnum::Params(VectorParams {
                        size: self.dimension as u64,
                        distance: Distance::from(self.distance).into(),
                        ..Default::default()
                    })),
                },
            ))
            .await
            .map_err(|e| EngineError::storage("create_collection", e))?;
        Ok(())
    }

    /// Insert or replace points by id. Atomic per-batch from the caller's
    /// view; on partial failure the successfully written ids are still
    /// returned rather than losing track of them.
    pub async fn upsert(&self, memories: &[Memory]) -> EngineResult<Vec<Uuid>> {
        if memories.is_empty() {
            return Ok(Vec::new());
        }
        for m in memories {
            m.check_invariants(self.dimension)?;
        }
        let points: Vec<_> = memories
            .iter()
            .map(|m| payload::memory_to_point(m).map(payload::point_struct))
            .collect::<EngineResult<Vec<_>>>()?;

        let lease = self.pool.acquire().await?;
        lease
            .client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| EngineError::storage("upsert", e))?;
        Ok(memories.iter().map(|m| m.id).collect())
    }

    /// Insert or replace `CodeUnit`s, which carry `language`/`file_path`
    /// payload fields on top of the base `Memory` schema.
    pub async fn upsert_code_units(&self, units: &[crate::model::CodeUnit]) -> EngineResult<Vec<Uuid>> {
        if units.is_empty() {
            return Ok(Vec::new());
        }
        for u in units {
            u.memory.check_invariants(self.dimension)?;
        }
        let points: Vec<_> = units
            .iter()
            .map(|u| payload::code_unit_to_point(u).map(payload::point_struct))
            .collect::<EngineResult<Vec<_>>>()?;

        let lease = self.pool.acquire().await?;
        lease
            .client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| EngineError::storage("upsert_code_units", e))?;
        Ok(units.iter().map(|u| u.memory.id).collect())
    }

    /// Fetch a single point. `NotFound` if absent.
    pub async fn retrieve(&self, id: Uuid) -> EngineResult<Memory> {
        let lease = self.pool.acquire().await?;
        let response = lease
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![PointId::from(id.to_string())])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| EngineError::storage("retrieve", e))?;

        let point = response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::not_found("memory", id))?;

        let vector = point
            .vectors
            .and_then(|v| v.vectors_options)
            .and_then(|opts| match opts {
                qdrant_client::qdrant::vectors::VectorsOptions::Vector(v) => Some(v.data),
                _ => None,
            })
            .unwrap_or_default();

        payload::memory_from_payload(id, &point.payload, vector)
    }

    /// Top-k nearest subject to `filter`. `k=0` returns `[]`. Ties broken by
    /// id lexicographically via qdrant's stable ordering on equal scores.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        filter: &Filter,
        k: usize,
    ) -> EngineResult<Vec<ScoredPoint>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                configured: self.dimension,
                actual: query_vector.len(),
            });
        }
        let lease = self.pool.acquire().await?;
        let response = lease
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query_vector, k as u64)
                    .filter(filter.to_qdrant())
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| EngineError::storage("search", e))?;

        let mut hits = Vec::with_capacity(response.result.len());
        for scored in response.result {
            let Some(point_id) = scored.id.clone() else {
                continue;
            };
            let id = parse_point_id(&point_id)?;
            let vector = scored
                .vectors
                .clone()
                .and_then(|v| v.vectors_options)
                .and_then(|opts| match opts {
                    qdrant_client::qdrant::vectors::VectorsOptions::Vector(v) => Some(v.data),
                    _ => None,
                })
                .unwrap_or_default();
            let memory = payload::memory_from_payload(id, &scored.payload, vector)?;
            hits.push(ScoredPoint {
                memory,
                score: scored.score,
            });
        }
        // Stable ordering: score desc, ties broken by id lexicographically.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        Ok(hits)
    }

    /// Merge payload fields; if `vector` is supplied, replace atomically.
    pub async fn update(
        &self,
        id: Uuid,
        payload_patch: serde_json::Value,
        vector: Option<Vec<f32>>,
    ) -> EngineResult<()> {
        let lease = self.pool.acquire().await?;
        let patch = qdrant_client::Payload::try_from(payload_patch)
            .map_err(|e| EngineError::internal(format!("invalid payload patch: {e}")))?;
        lease
            .client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.collection, patch)
                    .points_selector(PointsSelector::from(vec![PointId::from(id.to_string())]))
                    .wait(true),
            )
            .await
            .map_err(|e| EngineError::storage("update_payload", e))?;

        if let Some(vector) = vector {
            if vector.len() != self.dimension {
                return Err(EngineError::DimensionMismatch {
                    configured: self.dimension,
                    actual: vector.len(),
                });
            }
            lease
                .client
                .update_vectors(qdrant_client::qdrant::UpdatePointVectorsBuilder::new(
                    &self.collection,
                    vec![qdrant_client::qdrant::PointVectors {
                        id: Some(PointId::from(id.to_string())),
                        vectors: Some(vector.into()),
                    }],
                ))
                .await
                .map_err(|e| EngineError::storage("update_vector", e))?;
        }
        Ok(())
    }

    /// Idempotent: deleting a nonexistent point is "ok, not present".
    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let lease = self.pool.acquire().await?;
        lease
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList {
                        ids: vec![PointId::from(id.to_string())],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| EngineError::storage("delete", e))?;
        Ok(())
    }

    /// Filtered delete, bounded to at most `max` points. `max=0` deletes
    /// nothing.
    ///
    /// Implemented as a bounded scroll for matching ids followed by a
    /// delete of exactly that id set, not a single server-side filtered
    /// delete: qdrant's delete has no built-in cap, and enforcing "at most
    /// max" requires knowing which ids that cap selects. This leaves a
    /// TOCTOU window between the scroll and the delete — a point written
    /// after the scroll but before the delete call, and matching
    /// `filter`, is not included in this call's deletion. Both id-gathering
    /// and the delete itself still run entirely server-side per request.
    pub async fn delete_by_filter(&self, filter: &Filter, max: usize) -> EngineResult<usize> {
        if max == 0 {
            return Ok(0);
        }
        let ids = self.matching_ids(filter, max).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let lease = self.pool.acquire().await?;
        lease
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList {
                        ids: ids.iter().map(|id| PointId::from(id.to_string())).collect(),
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| EngineError::storage("delete_by_filter", e))?;
        Ok(ids.len())
    }

    async fn matching_ids(&self, filter: &Filter, limit: usize) -> EngineResult<Vec<Uuid>> {
        let lease = self.pool.acquire().await?;
        let response = lease
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .filter(filter.to_qdrant())
                    .limit(limit as u32)
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| EngineError::storage("scroll_for_delete", e))?;
        response
            .result
            .into_iter()
            .filter_map(|p| p.id)
            .map(|pid| parse_point_id(&pid))
            .collect()
    }

    /// Bounded listing for pagination.
    pub async fn scroll(
        &self,
        filter: &Filter,
        cursor: Option<String>,
        limit: usize,
    ) -> EngineResult<ScrollPage> {
        let lease = self.pool.acquire().await?;
        let mut builder = ScrollPointsBuilder::new(&self.collection)
            .filter(filter.to_qdrant())
            .limit(limit as u32)
            .with_payload(true)
            .with_vectors(true);
        if let Some(cursor) = cursor {
            builder = builder.offset(PointId::from(cursor));
        }
        let response = lease
            .client
            .scroll(builder)
            .await
            .map_err(|e| EngineError::storage("scroll", e))?;

        let mut points = Vec::with_capacity(response.result.len());
        for p in response.result {
            let Some(point_id) = p.id.clone() else { continue };
            let id = parse_point_id(&point_id)?;
            let vector = p
                .vectors
                .and_then(|v| v.vectors_options)
                .and_then(|opts| match opts {
                    qdrant_client::qdrant::vectors::VectorsOptions::Vector(v) => Some(v.data),
                    _ => None,
                })
                .unwrap_or_default();
            points.push(payload::memory_from_payload(id, &p.payload, vector)?);
        }
        let next_cursor = response.next_page_offset.and_then(|pid| match pid.point_id_options {
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => Some(u),
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => Some(n.to_string()),
            None => None,
        });
        Ok(ScrollPage { points, next_cursor })
    }

    /// Snapshot of the underlying connection pool's observability counters.
    pub fn pool_metrics(&self) -> crate::pool::PoolMetrics {
        self.pool.metrics()
    }
}

fn existing_dimension(info: &qdrant_client::qdrant::CollectionInfo) -> Option<u64> {
    let params = info.config.as_ref()?.params.as_ref()?;
    match params.vectors_config.as_ref()?.config.as_ref()? {
        VectorsConfigEnum::Params(p) => Some(p.size),
        VectorsConfigEnum::ParamsMap(_) => None,
    }
}

fn parse_point_id(point_id: &PointId) -> EngineResult<Uuid> {
    match &point_id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => {
            Uuid::parse_str(s).map_err(|e| EngineError::internal(format!("invalid point id: {e}")))
        }
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(_)) => {
            Err(EngineError::internal("expected uuid point id, got numeric"))
        }
        None => Err(EngineError::internal("point id missing")),
    }
}
