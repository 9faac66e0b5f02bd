//! Upload protocols.
//!
//! - Streaming: the request body is piped straight into the local backend
//!   while its length is checked against the declared size.
//! - Two-phase: the client gets a presigned URL, uploads to the object
//!   store, then asks the server to verify and commit.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::{BackendKind, ByteStream, StorageBackend};
use cloudbox_database::Repositories;
use cloudbox_database::repositories::FileRepository;
use cloudbox_entity::file::File;

use super::limit::LimitedStream;
use super::service::{FileService, NewFile};
use crate::context::RequestContext;

/// Name used for streamed uploads that arrive without one.
pub const DEFAULT_UPLOAD_NAME: &str = "untitled";

/// Metadata sent alongside a streamed body.
#[derive(Debug, Clone)]
pub struct StreamUpload {
    /// Target directory; the actor's root when absent.
    pub parent_dir_id: Option<Uuid>,
    /// File name; defaults to "untitled".
    pub filename: Option<String>,
    /// Declared size. The body may be shorter, never longer.
    pub declared_size: u64,
    /// MIME type of the body.
    pub content_type: Option<String>,
}

/// Request to begin a two-phase upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateUpload {
    /// File name.
    pub filename: String,
    /// Exact size the client will upload.
    pub filesize: u64,
    /// MIME type the upload URL is signed for. Blank falls back to the
    /// default content type.
    pub filetype: String,
}

/// Response to [`UploadService::initiate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedUpload {
    /// Id of the pending file; pass it to the complete call.
    pub id: Uuid,
    /// Presigned PUT URL.
    pub url: String,
}

/// Drives both upload protocols.
#[derive(Debug, Clone)]
pub struct UploadService {
    /// File lifecycle operations.
    file_service: FileService,
    /// File repository (abort cleanup).
    files: Arc<dyn FileRepository>,
    /// Object storage.
    storage: Arc<dyn StorageBackend>,
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(repos: &Repositories, file_service: FileService) -> Self {
        Self {
            storage: file_service.storage().clone(),
            files: repos.files.clone(),
            file_service,
        }
    }

    /// Streams `body` into storage and commits the file with the number of
    /// bytes actually received.
    ///
    /// Quota and the ceiling are checked against the declared size before
    /// anything is written. If the body overruns the declared size, the
    /// connection fails, or this future is dropped, the partial object and
    /// the pending record are removed and nothing is charged.
    pub async fn stream_upload(
        &self,
        ctx: &RequestContext,
        upload: StreamUpload,
        body: ByteStream,
    ) -> AppResult<File> {
        if self.storage.kind() != BackendKind::Local {
            return Err(AppError::validation(
                "Streaming uploads are only available with local storage; use /file/initiate",
            ));
        }

        let name = upload
            .filename
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        let file = self
            .file_service
            .insert_pending(
                ctx,
                NewFile {
                    parent_dir_id: upload.parent_dir_id,
                    name,
                    size: upload.declared_size,
                    content_type: upload.content_type,
                },
            )
            .await?;

        let guard = AbortGuard::new(&file, self.files.clone(), self.storage.clone());

        let limited = LimitedStream::new(body, upload.declared_size);
        let overflowed = limited.overflow_flag();

        let received = match self.storage.put_stream(&file.storage_key(), Box::pin(limited)).await {
            Ok(received) => received,
            Err(e) => {
                guard.abort().await;
                if overflowed.load(Ordering::Acquire) {
                    return Err(AppError::size_mismatch(format!(
                        "Upload exceeded the declared size of {} bytes",
                        upload.declared_size
                    )));
                }
                warn!(file_id = %file.id, error = %e, "Streaming upload failed");
                return Err(match e.kind {
                    ErrorKind::Storage => e,
                    _ => AppError::with_source(ErrorKind::Storage, "Upload failed", e),
                });
            }
        };

        let size = i64::try_from(received)
            .map_err(|_| AppError::validation("Uploaded file size is out of range"))?;
        let committed = match self.files.commit(file.id, size).await {
            Ok(Some(committed)) => committed,
            Ok(None) => {
                guard.abort().await;
                return Err(AppError::not_found("Upload was cancelled before it finished"));
            }
            Err(e) => {
                guard.abort().await;
                return Err(e);
            }
        };
        guard.disarm();

        info!(
            user_id = %ctx.user_id(),
            file_id = %committed.id,
            declared = upload.declared_size,
            received,
            "Streaming upload committed"
        );
        Ok(committed)
    }

    /// Begin a two-phase upload: create the pending record and sign a URL.
    pub async fn initiate(
        &self,
        ctx: &RequestContext,
        parent_dir_id: Option<Uuid>,
        request: InitiateUpload,
    ) -> AppResult<InitiatedUpload> {
        if self.storage.kind() != BackendKind::Remote {
            return Err(AppError::validation(
                "Presigned uploads are only available with remote storage; use /file/upload",
            ));
        }

        let (file, url) = self
            .file_service
            .create_pending_file(
                ctx,
                NewFile {
                    parent_dir_id,
                    name: request.filename,
                    size: request.filesize,
                    content_type: Some(request.filetype).filter(|t| !t.trim().is_empty()),
                },
            )
            .await?;

        Ok(InitiatedUpload { id: file.id, url })
    }

    /// Finish a two-phase upload.
    pub async fn complete(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        self.file_service.commit_file(ctx, file_id).await
    }
}

/// Cleans up a streamed upload that did not reach commit.
///
/// Error paths call [`AbortGuard::abort`] and wait for it. If the request
/// future is dropped mid-stream the cleanup is spawned from `Drop` instead.
struct AbortGuard {
    file_id: Uuid,
    key: String,
    files: Arc<dyn FileRepository>,
    storage: Arc<dyn StorageBackend>,
    armed: bool,
}

impl AbortGuard {
    fn new(file: &File, files: Arc<dyn FileRepository>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            file_id: file.id,
            key: file.storage_key(),
            files,
            storage,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }

    async fn abort(mut self) {
        self.armed = false;
        cleanup(
            self.file_id,
            self.key.clone(),
            self.files.clone(),
            self.storage.clone(),
        )
        .await;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let cleanup = cleanup(
            self.file_id,
            std::mem::take(&mut self.key),
            self.files.clone(),
            self.storage.clone(),
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(cleanup);
            }
            Err(_) => warn!(
                file_id = %self.file_id,
                "No runtime to clean up an abandoned upload; the reaper will remove it"
            ),
        }
    }
}

async fn cleanup(
    file_id: Uuid,
    key: String,
    files: Arc<dyn FileRepository>,
    storage: Arc<dyn StorageBackend>,
) {
    if let Err(e) = storage.delete(&key).await {
        warn!(file_id = %file_id, error = %e, "Failed to delete aborted upload object");
    }
    match files.discard_pending(file_id).await {
        Ok(_) => info!(file_id = %file_id, "Aborted upload discarded"),
        Err(e) => warn!(file_id = %file_id, error = %e, "Failed to delete aborted upload record"),
    }
}
