//! PostgreSQL file repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_entity::file::{CreateFile, File};

use super::FileRepository;
use super::directory::add_size_on;

/// Repository for file CRUD and lifecycle transitions.
#[derive(Debug, Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))
    }

    async fn find_in_directory(&self, dir_id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE parent_dir_id = $1 ORDER BY name COLLATE \"C\" ASC",
        )
        .bind(dir_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))
    }

    async fn find_in_directories(&self, dir_ids: &[Uuid]) -> AppResult<Vec<File>> {
        if dir_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE parent_dir_id = ANY($1)")
            .bind(dir_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))
    }

    async fn create(&self, data: &CreateFile) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "INSERT INTO files \
             (id, name, size, extension, content_type, user_id, parent_dir_id, path, is_uploading) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE) RETURNING *",
        )
        .bind(data.id)
        .bind(&data.name)
        .bind(data.size)
        .bind(&data.extension)
        .bind(&data.content_type)
        .bind(data.user_id)
        .bind(data.parent_dir_id)
        .bind(&data.path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::conflict(format!("File {} already exists", data.id))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create file", e),
        })
    }

    async fn commit(&self, id: Uuid, size: i64) -> AppResult<Option<File>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        // The is_uploading guard makes a second commit a no-op.
        let committed = sqlx::query_as::<_, File>(
            "UPDATE files SET is_uploading = FALSE, size = $2, updated_at = NOW() \
             WHERE id = $1 AND is_uploading RETURNING *",
        )
        .bind(id)
        .bind(size)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit file", e))?;

        let Some(file) = committed else {
            return Ok(None);
        };

        let updated = add_size_on(&mut *tx, file.parent_dir_id, file.size).await?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;

        debug!(file_id = %id, size, directories = updated, "File committed");
        Ok(Some(file))
    }

    async fn rename(&self, id: Uuid, name: &str) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to rename file", e))?
        .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<File>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let deleted = sqlx::query_as::<_, File>("DELETE FROM files WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete file", e))?;

        if let Some(file) = deleted.as_ref().filter(|f| f.is_committed() && f.size != 0) {
            add_size_on(&mut *tx, file.parent_dir_id, -file.size).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;

        Ok(deleted)
    }

    async fn discard_pending(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1 AND is_uploading")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to discard pending file", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_stale_pending(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE is_uploading AND created_at < $1 ORDER BY created_at ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find stale uploads", e)
        })
    }
}
