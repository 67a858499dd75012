//! Conversion between the engine's `Memory`/`CodeUnit` model and the
//! persisted payload schema:
//! `{project, category, content, language?, file_path?, tags, importance,
//! lifecycle_state, created_at, updated_at, access_count}` + vector.

use qdrant_client::qdrant::{value::Kind, PointStruct, Value as QdrantValue};
use qdrant_client::Payload;
use serde_json::json;

use crate::error::{EngineError, EngineResult};
use crate::model::{CodeUnit, LifecycleState, Memory, MemoryCategory, Tag};

/// A point ready to upsert: id, vector, and payload.
pub struct VectorPoint {
    pub id: uuid::Uuid,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

pub fn memory_to_point(memory: &Memory) -> EngineResult<VectorPoint> {
    build_point(memory, None)
}

/// A `CodeUnit` is a `Memory` (carrying its own `language`) plus the
/// `file_path` payload field code-backed points also carry.
pub fn code_unit_to_point(unit: &CodeUnit) -> EngineResult<VectorPoint> {
    build_point(&unit.memory, Some(unit.file_path.as_str()))
}

fn build_point(memory: &Memory, file_path: Option<&str>) -> EngineResult<VectorPoint> {
    let payload = Payload::try_from(json!({
        "project": memory.project,
        "category": memory.category.as_str(),
        "content": memory.content,
        "language": memory.language,
        "file_path": file_path,
        "tags": memory.tags.iter().map(|t| t.as_str().to_string()).collect::<Vec<_>>(),
        "importance": memory.importance.get(),
        "lifecycle_state": memory.lifecycle.as_str(),
        "created_at": memory.timestamps.created_at.to_rfc3339(),
        "updated_at": memory.timestamps.updated_at.to_rfc3339(),
        "access_count": memory.access_count,
    }))
    .map_err(|e| EngineError::internal(format!("payload serialization failed: {e}")))?;

    Ok(VectorPoint {
        id: memory.id,
        vector: memory.embedding.clone(),
        payload,
    })
}

pub fn point_struct(point: VectorPoint) -> PointStruct {
    PointStruct::new(point.id.to_string(), point.vector, point.payload)
}

/// Reconstruct a `Memory` from a retrieved payload + vector. `NotFound`-style
/// lookups call this after reading a raw qdrant point.
pub fn memory_from_payload(
    id: uuid::Uuid,
    payload: &std::collections::HashMap<String, QdrantValue>,
    vector: Vec<f32>,
) -> EngineResult<Memory> {
    let get_str = |key: &str| -> Option<String> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
    };
    let get_f64 = |key: &str| -> Option<f64> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(Kind::DoubleValue(d)) => Some(*d),
            Some(Kind::IntegerValue(i)) => Some(*i as f64),
            _ => None,
        })
    };

    let project = get_str("project")
        .ok_or_else(|| EngineError::internal("payload missing `project`"))?;
    let category_str =
        get_str("category").ok_or_else(|| EngineError::internal("payload missing `category`"))?;
    let content =
        get_str("content").ok_or_else(|| EngineError::internal("payload missing `content`"))?;
    let importance = get_f64("importance").unwrap_or(0.0) as f32;
    let lifecycle_str = get_str("lifecycle_state").unwrap_or_else(|| "active".to_string());
    let created_at = get_str("created_at")
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);
    let updated_at = get_str("updated_at")
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or(created_at);
    let access_count = payload
        .get("access_count")
        .and_then(|v| match &v.kind {
            Some(Kind::IntegerValue(i)) => Some(*i as u64),
            _ => None,
        })
        .unwrap_or(0);
    let tags = payload
        .get("tags")
        .and_then(|v| match &v.kind {
            Some(Kind::ListValue(list)) => Some(
                list.values
                    .iter()
                    .filter_map(|v| match &v.kind {
                        Some(Kind::StringValue(s)) => Tag::new(s.clone()).ok(),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();

    let lifecycle = match lifecycle_str.as_str() {
        "active" => LifecycleState::Active,
        "recent" => LifecycleState::Recent,
        "archived" => LifecycleState::Archived,
        _ => LifecycleState::Stale,
    };

    Ok(Memory {
        id,
        content,
        category: MemoryCategory::parse(&category_str)?,
        importance: crate::model::Importance::new(importance)?,
        tags,
        project,
        timestamps: crate::model::TimestampPair {
            created_at,
            updated_at,
        },
        access_count,
        last_accessed: updated_at,
        lifecycle,
        embedding: vector,
        language: get_str("language"),
    })
}
