//! File records: creation, commit, rename, delete and read.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use cloudbox_auth::rbac::{AccessPolicy, Action};
use cloudbox_core::config::StorageConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::{
    Disposition, DownloadRequest, DownloadTarget, StorageBackend,
};
use cloudbox_database::Repositories;
use cloudbox_database::repositories::{DirectoryRepository, FileRepository, UserRepository};
use cloudbox_entity::directory::Directory;
use cloudbox_entity::file::{CreateFile, File};

use crate::context::RequestContext;
use crate::quota::QuotaPolicy;
use crate::sanitize;

/// MIME type recorded when the uploader supplies none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Parameters for a new pending file.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Target directory; the actor's root when absent.
    pub parent_dir_id: Option<Uuid>,
    /// Unsanitized name.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Declared MIME type.
    pub content_type: Option<String>,
}

/// Manages the file lifecycle.
#[derive(Debug, Clone)]
pub struct FileService {
    /// File repository.
    files: Arc<dyn FileRepository>,
    /// Directory repository (parent lookups).
    directories: Arc<dyn DirectoryRepository>,
    /// User repository (quota of the owning account).
    users: Arc<dyn UserRepository>,
    /// Object storage.
    storage: Arc<dyn StorageBackend>,
    /// Quota and per-file ceiling.
    quota: QuotaPolicy,
    /// Lifetime of presigned URLs.
    signed_url_ttl: Duration,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(
        repos: &Repositories,
        storage: Arc<dyn StorageBackend>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            files: repos.files.clone(),
            directories: repos.directories.clone(),
            users: repos.users.clone(),
            storage,
            quota: QuotaPolicy::from_config(config),
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl_seconds),
        }
    }

    /// The storage backend files are kept in.
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Load a file or fail with `NotFound`.
    pub async fn find(&self, file_id: Uuid) -> AppResult<File> {
        self.files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found("File not found"))
    }

    async fn find_directory(&self, dir_id: Uuid) -> AppResult<Directory> {
        self.directories
            .find_by_id(dir_id)
            .await?
            .ok_or_else(|| AppError::not_found("Directory not found"))
    }

    /// Validate and insert a pending file without requesting an upload URL.
    ///
    /// The file belongs to the parent directory's owner and is charged
    /// against that owner's quota, which matters when an owner-role actor
    /// uploads into someone else's tree.
    pub async fn insert_pending(&self, ctx: &RequestContext, new: NewFile) -> AppResult<File> {
        let name = sanitize::file_name(&new.name)?;

        let parent = self
            .find_directory(new.parent_dir_id.unwrap_or(ctx.actor.root_dir_id))
            .await?;
        AccessPolicy::authorize(&ctx.actor, parent.user_id, Action::Upload)?;

        let owner = if parent.user_id == ctx.user_id() {
            ctx.actor.clone()
        } else {
            self.users
                .find_by_id(parent.user_id)
                .await?
                .ok_or_else(|| AppError::not_found("Owner of the target directory not found"))?
        };
        let root = self.find_directory(owner.root_dir_id).await?;
        self.quota.check(&owner, &root, new.size)?;

        let size = i64::try_from(new.size)
            .map_err(|_| AppError::validation("Declared file size is out of range"))?;
        let content_type = new
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let record = CreateFile {
            id: Uuid::new_v4(),
            extension: File::extension_of(&name),
            name,
            size,
            content_type: Some(content_type),
            user_id: parent.user_id,
            parent_dir_id: parent.id,
            path: parent.path.clone(),
        };
        let file = self.files.create(&record).await?;

        info!(
            user_id = %ctx.user_id(),
            owner_id = %file.user_id,
            file_id = %file.id,
            declared = file.size,
            "Pending file created"
        );
        Ok(file)
    }

    /// Insert a pending file and issue a presigned upload URL for it.
    pub async fn create_pending_file(
        &self,
        ctx: &RequestContext,
        new: NewFile,
    ) -> AppResult<(File, String)> {
        let file = self.insert_pending(ctx, new).await?;
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        match self
            .storage
            .upload_url(&file.storage_key(), &content_type, self.signed_url_ttl)
            .await
        {
            Ok(url) => Ok((file, url)),
            Err(e) => {
                self.files.discard_pending(file.id).await?;
                Err(e)
            }
        }
    }

    /// Confirm the stored object and commit a pending file.
    ///
    /// The object's size must equal the declared size; otherwise the object
    /// and the record are both removed and `SizeMismatch` is returned.
    pub async fn commit_file(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.find(file_id).await?;
        if file.is_committed() {
            return Err(AppError::not_found("No pending upload for this file"));
        }
        AccessPolicy::authorize(&ctx.actor, file.user_id, Action::Upload)?;

        let key = file.storage_key();
        let stored = self.storage.object_size(&key).await?;
        if stored != Some(file.size_bytes()) {
            warn!(
                file_id = %file.id,
                declared = file.size,
                stored = ?stored,
                "Uploaded object does not match declared size"
            );
            self.discard(&file).await;
            return Err(AppError::size_mismatch(format!(
                "Expected {} bytes, found {}",
                file.size,
                stored.map_or_else(|| "no object".to_string(), |s| format!("{s} bytes"))
            )));
        }

        let committed = self
            .files
            .commit(file.id, file.size)
            .await?
            .ok_or_else(|| AppError::not_found("No pending upload for this file"))?;

        info!(
            user_id = %ctx.user_id(),
            file_id = %committed.id,
            size = committed.size,
            "File committed"
        );
        Ok(committed)
    }

    /// Remove a pending file's object and record, logging failures.
    pub(crate) async fn discard(&self, file: &File) {
        if let Err(e) = self.storage.delete(&file.storage_key()).await {
            warn!(file_id = %file.id, error = %e, "Failed to delete discarded object");
        }
        if let Err(e) = self.files.discard_pending(file.id).await {
            warn!(file_id = %file.id, error = %e, "Failed to delete discarded file record");
        }
    }

    /// Renames a file. The extension and storage key are unchanged.
    pub async fn rename_file(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        new_name: &str,
    ) -> AppResult<File> {
        let name = sanitize::file_name(new_name)?;
        let file = self.find(file_id).await?;
        AccessPolicy::authorize(&ctx.actor, file.user_id, Action::Modify)?;

        let renamed = self.files.rename(file_id, &name).await?;
        info!(user_id = %ctx.user_id(), file_id = %file_id, "File renamed");
        Ok(renamed)
    }

    /// Deletes a file's object and record; a committed file's size is
    /// subtracted from its ancestors.
    pub async fn delete_file(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.find(file_id).await?;
        AccessPolicy::authorize(&ctx.actor, file.user_id, Action::Delete)?;

        self.storage.delete(&file.storage_key()).await?;
        let deleted = self
            .files
            .delete(file_id)
            .await?
            .ok_or_else(|| AppError::not_found("File not found"))?;

        info!(
            user_id = %ctx.user_id(),
            file_id = %file_id,
            size = deleted.size,
            committed = deleted.is_committed(),
            "File deleted"
        );
        Ok(deleted)
    }

    /// Resolve how to deliver a committed file's bytes.
    pub async fn read_file(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        disposition: Disposition,
    ) -> AppResult<(File, DownloadTarget)> {
        let file = self.find(file_id).await?;
        AccessPolicy::authorize(&ctx.actor, file.user_id, Action::Read)?;
        if !file.is_committed() {
            return Err(AppError::not_found("File is still uploading"));
        }

        let request = DownloadRequest {
            filename: file.name.clone(),
            disposition,
            content_type: file.content_type.clone(),
            ttl: self.signed_url_ttl,
        };
        let target = self.storage.download(&file.storage_key(), &request).await?;
        Ok((file, target))
    }
}
