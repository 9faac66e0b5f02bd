//! Directory CRUD, listing and recursive deletion.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use cloudbox_auth::rbac::{AccessPolicy, Action};
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::StorageBackend;
use cloudbox_database::Repositories;
use cloudbox_database::repositories::{DirectoryRepository, FileRepository};
use cloudbox_entity::directory::{
    Breadcrumb, CreateDirectory, Directory, DirectoryEntry, DirectoryListing, FileEntry,
};

use super::tree::{MAX_TREE_DEPTH, collect_subtree};
use crate::context::RequestContext;
use crate::sanitize;

/// Manages the directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryService {
    /// Directory repository.
    directories: Arc<dyn DirectoryRepository>,
    /// File repository (for listings and subtree deletes).
    files: Arc<dyn FileRepository>,
    /// Object storage.
    storage: Arc<dyn StorageBackend>,
}

impl DirectoryService {
    /// Creates a new directory service.
    pub fn new(repos: &Repositories, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            directories: repos.directories.clone(),
            files: repos.files.clone(),
            storage,
        }
    }

    /// Load a directory or fail with `NotFound`.
    pub async fn find(&self, dir_id: Uuid) -> AppResult<Directory> {
        self.directories
            .find_by_id(dir_id)
            .await?
            .ok_or_else(|| AppError::not_found("Directory not found"))
    }

    /// Load `dir_id`, or the actor's root when absent.
    pub async fn resolve(&self, ctx: &RequestContext, dir_id: Option<Uuid>) -> AppResult<Directory> {
        self.find(dir_id.unwrap_or(ctx.actor.root_dir_id)).await
    }

    /// Creates a subdirectory. A blank name becomes "New Folder".
    ///
    /// Refused once the parent's path already holds `MAX_TREE_DEPTH` entries,
    /// so every tree built here can still be deleted as a whole.
    pub async fn create_directory(
        &self,
        ctx: &RequestContext,
        parent_dir_id: Option<Uuid>,
        name: Option<&str>,
    ) -> AppResult<Directory> {
        let parent = self.resolve(ctx, parent_dir_id).await?;
        AccessPolicy::authorize(&ctx.actor, parent.user_id, Action::Upload)?;
        if parent.path.len() >= MAX_TREE_DEPTH {
            return Err(AppError::validation(format!(
                "Directories cannot be nested more than {MAX_TREE_DEPTH} levels deep"
            )));
        }

        let record = CreateDirectory::child_of(&parent, sanitize::directory_name(name));
        let directory = self.directories.create(&record).await?;

        info!(
            user_id = %ctx.user_id(),
            dir_id = %directory.id,
            parent_dir_id = %parent.id,
            "Directory created"
        );

        Ok(directory)
    }

    /// Renames a directory. A blank name becomes "New Folder".
    pub async fn rename_directory(
        &self,
        ctx: &RequestContext,
        dir_id: Uuid,
        new_name: Option<&str>,
    ) -> AppResult<Directory> {
        let directory = self.find(dir_id).await?;
        AccessPolicy::authorize(&ctx.actor, directory.user_id, Action::Modify)?;

        let renamed = self
            .directories
            .rename(dir_id, &sanitize::directory_name(new_name))
            .await?;

        info!(user_id = %ctx.user_id(), dir_id = %dir_id, "Directory renamed");
        Ok(renamed)
    }

    /// Lists the files and subdirectories of `dir_id` (default: the actor's
    /// root), each sorted by name and carrying resolved breadcrumbs.
    pub async fn list_children(
        &self,
        ctx: &RequestContext,
        dir_id: Option<Uuid>,
    ) -> AppResult<DirectoryListing> {
        let directory = self.resolve(ctx, dir_id).await?;
        AccessPolicy::authorize(&ctx.actor, directory.user_id, Action::Read)?;

        let subdirectories = self.directories.find_children(directory.id).await?;
        let files = self.files.find_in_directory(directory.id).await?;

        // Every breadcrumb is a prefix of the listed path plus one child id.
        let mut ids = directory.path.clone();
        ids.extend(subdirectories.iter().map(|d| d.id));
        let names = self.directories.find_names(&ids).await?;

        let directories = subdirectories
            .into_iter()
            .map(|d| DirectoryEntry {
                breadcrumbs: breadcrumbs(&d.path, &names),
                directory: d,
            })
            .collect();
        let files = files
            .into_iter()
            .map(|f| FileEntry {
                breadcrumbs: breadcrumbs(&f.path, &names),
                file: f,
            })
            .collect();

        Ok(DirectoryListing {
            breadcrumbs: breadcrumbs(&directory.path, &names),
            directory,
            directories,
            files,
        })
    }

    /// Deletes a directory, everything below it, and every stored object of
    /// the files it contained.
    ///
    /// Objects go first in one batched call; if that fails the rows are left
    /// untouched so the delete can be retried.
    pub async fn delete_directory_subtree(&self, ctx: &RequestContext, dir_id: Uuid) -> AppResult<()> {
        let directory = self.find(dir_id).await?;
        if directory.is_root() {
            return Err(AppError::validation("The root directory cannot be deleted"));
        }
        AccessPolicy::authorize(&ctx.actor, directory.user_id, Action::Delete)?;

        let subtree = collect_subtree(self.directories.as_ref(), self.files.as_ref(), &directory).await?;

        let keys = subtree.storage_keys();
        if !keys.is_empty() {
            self.storage.delete_many(&keys).await.inspect_err(|e| {
                warn!(dir_id = %dir_id, error = %e, "Failed to delete subtree objects");
            })?;
        }

        self.directories
            .delete_subtree(&directory, &subtree.directory_ids, &subtree.file_ids())
            .await?;

        info!(
            user_id = %ctx.user_id(),
            dir_id = %dir_id,
            directories = subtree.directory_ids.len(),
            files = subtree.files.len(),
            "Directory subtree deleted"
        );
        Ok(())
    }

    /// Add `delta` bytes to `start_dir_id` and all of its ancestors.
    pub async fn propagate_size_delta(&self, start_dir_id: Uuid, delta: i64) -> AppResult<u64> {
        self.directories.add_size(start_dir_id, delta).await
    }
}

fn breadcrumbs(path: &[Uuid], names: &HashMap<Uuid, String>) -> Vec<Breadcrumb> {
    path.iter()
        .filter_map(|id| {
            names.get(id).map(|name| Breadcrumb {
                id: *id,
                name: name.clone(),
            })
        })
        .collect()
}
