//! Local metadata store: a SQLite-backed file table holding, per project,
//! `(path) -> (content_hash, last_indexed, unit_count)`, plus a small
//! per-project activity counter table. This is the source of truth the
//! Incremental Indexer consults to decide whether a file's content has
//! changed since the last index pass. Struct-wraps-a-pool,
//! `#[derive(sqlx::FromRow)]` row types, runtime `sqlx::query_as`/
//! `sqlx::query_scalar`/`sqlx::query` against `SqlitePool` rather than
//! `PgPool`, since this store is local state rather than a shared backend.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{EngineError, EngineResult};
use crate::model::{FileTableEntry, ProjectStats, ProjectState};

#[derive(Debug, Clone, sqlx::FromRow)]
struct FileTableRow {
    project: String,
    path: String,
    content_hash: String,
    last_indexed: DateTime<Utc>,
    unit_count: i64,
}

impl From<FileTableRow> for FileTableEntry {
    fn from(row: FileTableRow) -> Self {
        FileTableEntry {
            project: row.project,
            path: row.path,
            content_hash: row.content_hash,
            last_indexed: row.last_indexed,
            unit_count: row.unit_count as usize,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProjectStatsRow {
    project: String,
    searches: i64,
    updates: i64,
    state: String,
}

impl From<ProjectStatsRow> for ProjectStats {
    fn from(row: ProjectStatsRow) -> Self {
        ProjectStats {
            project: row.project,
            searches: row.searches as u64,
            updates: row.updates as u64,
            state: match row.state.as_str() {
                "paused" => ProjectState::Paused,
                "archived" => ProjectState::Archived,
                _ => ProjectState::Active,
            },
        }
    }
}

fn state_str(state: ProjectState) -> &'static str {
    match state {
        ProjectState::Active => "active",
        ProjectState::Paused => "paused",
        ProjectState::Archived => "archived",
    }
}

#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Creates the file table and project stats tables if they don't exist.
    /// Idempotent; safe to call on every startup.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> EngineResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_table (
                project TEXT NOT NULL,
                path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                last_indexed TEXT NOT NULL,
                unit_count INTEGER NOT NULL,
                PRIMARY KEY (project, path)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.migrate(file_table)", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS project_stats (
                project TEXT PRIMARY KEY,
                searches INTEGER NOT NULL DEFAULT 0,
                updates INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL DEFAULT 'active'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.migrate(project_stats)", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_file_entry(&self, project: &str, path: &str) -> EngineResult<Option<FileTableEntry>> {
        let row = sqlx::query_as::<_, FileTableRow>(
            r#"
            SELECT project, path, content_hash, last_indexed, unit_count
            FROM file_table
            WHERE project = ?1 AND path = ?2
            "#,
        )
        .bind(project)
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.get_file_entry", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    pub async fn list_file_entries(&self, project: &str) -> EngineResult<Vec<FileTableEntry>> {
        let rows = sqlx::query_as::<_, FileTableRow>(
            r#"
            SELECT project, path, content_hash, last_indexed, unit_count
            FROM file_table
            WHERE project = ?1
            ORDER BY path ASC
            "#,
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.list_file_entries", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, entry))]
    pub async fn upsert_file_entry(&self, entry: &FileTableEntry) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO file_table (project, path, content_hash, last_indexed, unit_count)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (project, path) DO UPDATE SET
                content_hash = excluded.content_hash,
                last_indexed = excluded.last_indexed,
                unit_count = excluded.unit_count
            "#,
        )
        .bind(&entry.project)
        .bind(&entry.path)
        .bind(&entry.content_hash)
        .bind(entry.last_indexed.to_rfc3339())
        .bind(entry.unit_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.upsert_file_entry", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_file_entry(&self, project: &str, path: &str) -> EngineResult<()> {
        sqlx::query("DELETE FROM file_table WHERE project = ?1 AND path = ?2")
            .bind(project)
            .bind(path)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::storage("metadata_store.remove_file_entry", e))?;

        Ok(())
    }

    /// Removes every file table row and stats row owned by `project`.
    /// Idempotent: deleting an already-absent project is a no-op success.
    #[instrument(skip(self))]
    pub async fn delete_project(&self, project: &str) -> EngineResult<()> {
        sqlx::query("DELETE FROM file_table WHERE project = ?1")
            .bind(project)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::storage("metadata_store.delete_project(file_table)", e))?;

        sqlx::query("DELETE FROM project_stats WHERE project = ?1")
            .bind(project)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::storage("metadata_store.delete_project(project_stats)", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn project_stats(&self, project: &str) -> EngineResult<ProjectStats> {
        let row = sqlx::query_as::<_, ProjectStatsRow>(
            "SELECT project, searches, updates, state FROM project_stats WHERE project = ?1",
        )
        .bind(project)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.project_stats", e))?;

        Ok(row.map(Into::into).unwrap_or_else(|| ProjectStats::new(project)))
    }

    #[instrument(skip(self))]
    pub async fn record_search(&self, project: &str) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_stats (project, searches, updates, state)
            VALUES (?1, 1, 0, 'active')
            ON CONFLICT (project) DO UPDATE SET searches = searches + 1
            "#,
        )
        .bind(project)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.record_search", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn record_update(&self, project: &str) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_stats (project, searches, updates, state)
            VALUES (?1, 0, 1, 'active')
            ON CONFLICT (project) DO UPDATE SET updates = updates + 1
            "#,
        )
        .bind(project)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.record_update", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_project_state(&self, project: &str, state: ProjectState) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_stats (project, searches, updates, state)
            VALUES (?1, 0, 0, ?2)
            ON CONFLICT (project) DO UPDATE SET state = excluded.state
            "#,
        )
        .bind(project)
        .bind(state_str(state))
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::storage("metadata_store.set_project_state", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> MetadataStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = MetadataStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_entry_is_none() {
        let store = test_store().await;
        assert!(store.get_file_entry("proj", "src/lib.rs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = test_store().await;
        let entry = FileTableEntry {
            project: "proj".into(),
            path: "src/lib.rs".into(),
            content_hash: "abc123".into(),
            last_indexed: Utc::now(),
            unit_count: 4,
        };
        store.upsert_file_entry(&entry).await.unwrap();
        let fetched = store.get_file_entry("proj", "src/lib.rs").await.unwrap().unwrap();
        assert_eq!(fetched.content_hash, "abc123");
        assert_eq!(fetched.unit_count, 4);
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_row() {
        let store = test_store().await;
        let mut entry = FileTableEntry {
            project: "proj".into(),
            path: "src/lib.rs".into(),
            content_hash: "abc123".into(),
            last_indexed: Utc::now(),
            unit_count: 4,
        };
        store.upsert_file_entry(&entry).await.unwrap();
        entry.content_hash = "def456".into();
        entry.unit_count = 7;
        store.upsert_file_entry(&entry).await.unwrap();

        let fetched = store.get_file_entry("proj", "src/lib.rs").await.unwrap().unwrap();
        assert_eq!(fetched.content_hash, "def456");
        assert_eq!(fetched.unit_count, 7);
        assert_eq!(store.list_file_entries("proj").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_project_clears_file_table_and_stats() {
        let store = test_store().await;
        let entry = FileTableEntry {
            project: "proj".into(),
            path: "src/lib.rs".into(),
            content_hash: "abc123".into(),
            last_indexed: Utc::now(),
            unit_count: 1,
        };
        store.upsert_file_entry(&entry).await.unwrap();
        store.record_search("proj").await.unwrap();

        store.delete_project("proj").await.unwrap();

        assert!(store.list_file_entries("proj").await.unwrap().is_empty());
        assert_eq!(store.project_stats("proj").await.unwrap().searches, 0);
    }

    #[tokio::test]
    async fn record_search_and_update_increment_counters() {
        let store = test_store().await;
        store.record_search("proj").await.unwrap();
        store.record_search("proj").await.unwrap();
        store.record_update("proj").await.unwrap();

        let stats = store.project_stats("proj").await.unwrap();
        assert_eq!(stats.searches, 2);
        assert_eq!(stats.updates, 1);
    }

    #[tokio::test]
    async fn project_state_defaults_to_active_until_set() {
        let store = test_store().await;
        assert_eq!(store.project_stats("proj").await.unwrap().state, ProjectState::Active);
        store.set_project_state("proj", ProjectState::Paused).await.unwrap();
        assert_eq!(store.project_stats("proj").await.unwrap().state, ProjectState::Paused);
    }
}
