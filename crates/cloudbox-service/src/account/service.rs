//! Account lifecycle: registration, storage usage, hard delete.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use cloudbox_auth::rbac::AccessPolicy;
use cloudbox_core::config::StorageConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::StorageBackend;
use cloudbox_database::Repositories;
use cloudbox_database::repositories::{DirectoryRepository, UserRepository};
use cloudbox_entity::directory::Directory;
use cloudbox_entity::user::{CreateUser, StorageUsage, User};

use crate::context::RequestContext;
use crate::sanitize;

/// Data submitted to create an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// Display name.
    pub name: String,
    /// Unique email address.
    pub email: String,
}

/// Manages accounts and their root directories.
#[derive(Debug, Clone)]
pub struct AccountService {
    /// User repository.
    users: Arc<dyn UserRepository>,
    /// Directory repository.
    directories: Arc<dyn DirectoryRepository>,
    /// Object storage.
    storage: Arc<dyn StorageBackend>,
    /// Quota assigned at registration.
    default_quota_bytes: i64,
}

impl AccountService {
    /// Creates a new account service.
    pub fn new(
        repos: &Repositories,
        storage: Arc<dyn StorageBackend>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            users: repos.users.clone(),
            directories: repos.directories.clone(),
            storage,
            default_quota_bytes: i64::try_from(config.default_quota_bytes).unwrap_or(i64::MAX),
        }
    }

    /// Load a user or fail with `NotFound`.
    pub async fn find(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Create an account and its root directory together.
    ///
    /// The first account ever registered becomes the owner.
    pub async fn register(&self, registration: Registration) -> AppResult<(User, Directory)> {
        let email = registration.email.trim().to_lowercase();
        if email.len() < 3 || !email.contains('@') || email.chars().any(char::is_whitespace) {
            return Err(AppError::validation("A valid email address is required"));
        }
        let name = sanitize::sanitize_name(&registration.name);
        if name.is_empty() {
            return Err(AppError::validation("Name cannot be empty"));
        }

        let root_name = format!("root-{}", sanitize::sanitize_name(&email));
        let (user, root) = self
            .users
            .create_with_root(
                &CreateUser {
                    name,
                    email,
                    max_storage_bytes: self.default_quota_bytes,
                },
                &root_name,
            )
            .await?;

        info!(
            user_id = %user.id,
            root_dir_id = %root.id,
            role = %user.role,
            "Account registered"
        );
        Ok((user, root))
    }

    /// Quota, usage, and remaining bytes for the actor.
    pub async fn usage(&self, ctx: &RequestContext) -> AppResult<StorageUsage> {
        let root = self
            .directories
            .find_by_id(ctx.actor.root_dir_id)
            .await?
            .ok_or_else(|| AppError::not_found("Root directory not found"))?;

        Ok(StorageUsage::new(
            ctx.actor.quota_bytes(),
            u64::try_from(root.size).unwrap_or(0),
        ))
    }

    /// Permanently remove a user with every directory, file and object.
    ///
    /// Rows are removed in one transaction. Objects are deleted afterwards
    /// in one batch; a storage failure is logged but not returned, since the
    /// records are already gone.
    pub async fn hard_delete_user(&self, ctx: &RequestContext, target_id: Uuid) -> AppResult<()> {
        let target = self.find(target_id).await?;
        AccessPolicy::authorize_user_admin(&ctx.actor, &target)?;

        let keys = self
            .users
            .hard_delete(target_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let purged = if keys.is_empty() {
            Ok(())
        } else {
            self.storage.delete_many(&keys).await
        };
        if let Err(e) = purged {
            error!(
                user_id = %target_id,
                objects = keys.len(),
                error = %e,
                "Failed to delete objects of removed user"
            );
        }

        info!(
            actor_id = %ctx.user_id(),
            user_id = %target_id,
            objects = keys.len(),
            "User permanently deleted"
        );
        Ok(())
    }
}
