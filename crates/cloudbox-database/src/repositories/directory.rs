//! PostgreSQL directory repository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_entity::directory::{CreateDirectory, Directory};

use super::DirectoryRepository;

/// Atomic increment over the ancestor chain, walked via `parent_dir_id`.
const ADD_SIZE_SQL: &str = "WITH RECURSIVE chain AS ( \
        SELECT id, parent_dir_id FROM directories WHERE id = $1 \
        UNION ALL \
        SELECT d.id, d.parent_dir_id FROM directories d INNER JOIN chain c ON d.id = c.parent_dir_id \
     ) \
     UPDATE directories SET size = size + $2, updated_at = NOW() \
     WHERE id IN (SELECT id FROM chain)";

/// Add `delta` to `start_dir_id` and all of its ancestors in one statement.
///
/// Usable with a pool or inside an open transaction.
pub(crate) async fn add_size_on<'e, E>(executor: E, start_dir_id: Uuid, delta: i64) -> AppResult<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(ADD_SIZE_SQL)
        .bind(start_dir_id)
        .bind(delta)
        .execute(executor)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to propagate directory size", e)
        })?;
    Ok(result.rows_affected())
}

/// Repository for directory CRUD and tree queries.
#[derive(Debug, Clone)]
pub struct PgDirectoryRepository {
    pool: PgPool,
}

impl PgDirectoryRepository {
    /// Create a new directory repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Directory>> {
        sqlx::query_as::<_, Directory>("SELECT * FROM directories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find directory", e))
    }

    async fn find_children(&self, parent_id: Uuid) -> AppResult<Vec<Directory>> {
        sqlx::query_as::<_, Directory>(
            "SELECT * FROM directories WHERE parent_dir_id = $1 ORDER BY name COLLATE \"C\" ASC",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list subdirectories", e))
    }

    async fn find_descendants(&self, root_id: Uuid) -> AppResult<Vec<Directory>> {
        sqlx::query_as::<_, Directory>(
            "SELECT * FROM directories WHERE path @> ARRAY[$1]::uuid[] AND id <> $1",
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list descendants", e))
    }

    async fn find_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM directories WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to resolve path names", e)
                })?;
        Ok(rows.into_iter().collect())
    }

    async fn create(&self, data: &CreateDirectory) -> AppResult<Directory> {
        sqlx::query_as::<_, Directory>(
            "INSERT INTO directories (id, name, parent_dir_id, user_id, path) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(data.id)
        .bind(&data.name)
        .bind(data.parent_dir_id)
        .bind(data.user_id)
        .bind(&data.path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("idx_directories_one_root_per_user") =>
            {
                AppError::conflict("User already has a root directory")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create directory", e),
        })
    }

    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Directory> {
        sqlx::query_as::<_, Directory>(
            "UPDATE directories SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to rename directory", e))?
        .ok_or_else(|| AppError::not_found(format!("Directory {id} not found")))
    }

    async fn add_size(&self, start_dir_id: Uuid, delta: i64) -> AppResult<u64> {
        add_size_on(&self.pool, start_dir_id, delta).await
    }

    async fn delete_subtree(
        &self,
        root: &Directory,
        directory_ids: &[Uuid],
        file_ids: &[Uuid],
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        // Lock the subtree root and take its size as of this transaction.
        let size: i64 =
            sqlx::query_scalar("SELECT size FROM directories WHERE id = $1 FOR UPDATE")
                .bind(root.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to lock directory", e)
                })?
                .ok_or_else(|| AppError::not_found(format!("Directory {} not found", root.id)))?;

        let files = sqlx::query("DELETE FROM files WHERE id = ANY($1)")
            .bind(file_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete files", e))?;

        let directories = sqlx::query("DELETE FROM directories WHERE id = ANY($1)")
            .bind(directory_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::conflict(format!(
                        "Directory {} changed while it was being deleted; retry the delete",
                        root.id
                    ))
                }
                _ => AppError::with_source(ErrorKind::Database, "Failed to delete directories", e),
            })?;

        if let Some(parent_id) = root.parent_dir_id.filter(|_| size != 0) {
            add_size_on(&mut *tx, parent_id, -size).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit subtree delete", e)
        })?;

        debug!(
            dir_id = %root.id,
            files = files.rows_affected(),
            directories = directories.rows_affected(),
            "Subtree rows deleted"
        );
        Ok(())
    }
}
