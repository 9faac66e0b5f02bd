//! PostgreSQL user repository.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_entity::directory::{CreateDirectory, Directory};
use cloudbox_entity::file::storage_key;
use cloudbox_entity::user::{CreateUser, User};

use super::UserRepository;

/// Repository for account creation and removal.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn tx_error(e: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, "Transaction failed", e)
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    async fn create_with_root(
        &self,
        data: &CreateUser,
        root_name: &str,
    ) -> AppResult<(User, Directory)> {
        let user_id = Uuid::new_v4();
        let root = CreateDirectory::root(user_id, root_name);

        let mut tx = self.pool.begin().await.map_err(tx_error)?;

        // Serialize registrations so only one can observe an empty table.
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, role, root_dir_id, max_storage_bytes) \
             VALUES ($1, $2, $3, \
                CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'user'::user_role ELSE 'owner'::user_role END, \
                $4, $5) \
             RETURNING *",
        )
        .bind(user_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(root.id)
        .bind(data.max_storage_bytes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.constraint() == Some("users_email_key") => {
                AppError::conflict(format!("Email '{}' is already registered", data.email))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create user", e),
        })?;

        let directory = sqlx::query_as::<_, Directory>(
            "INSERT INTO directories (id, name, parent_dir_id, user_id, path) \
             VALUES ($1, $2, NULL, $3, $4) RETURNING *",
        )
        .bind(root.id)
        .bind(&root.name)
        .bind(user_id)
        .bind(&root.path)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create root directory", e)
        })?;

        tx.commit().await.map_err(tx_error)?;

        Ok((user, directory))
    }

    async fn hard_delete(&self, id: Uuid) -> AppResult<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await.map_err(tx_error)?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock user", e))?;
        if exists.is_none() {
            return Ok(None);
        }

        let files: Vec<(Uuid, String)> =
            sqlx::query_as("DELETE FROM files WHERE user_id = $1 RETURNING id, extension")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to delete user files", e)
                })?;

        let directories = sqlx::query("DELETE FROM directories WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete user directories", e)
            })?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete user", e))?;

        tx.commit().await.map_err(tx_error)?;

        info!(
            user_id = %id,
            files = files.len(),
            directories = directories.rows_affected(),
            "User rows removed"
        );

        Ok(Some(
            files
                .into_iter()
                .map(|(file_id, extension)| storage_key(file_id, &extension))
                .collect(),
        ))
    }
}
