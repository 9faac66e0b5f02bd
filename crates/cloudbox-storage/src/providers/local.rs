//! Local filesystem storage backend.
//!
//! Objects are plain files named by their key directly under the root.
//! Writes go to a hidden `.{key}.partial` sibling first and are renamed into
//! place only after the incoming stream ends cleanly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::{
    BackendKind, ByteStream, DownloadRequest, DownloadTarget, StorageBackend,
};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    /// Create a backend rooted at `root_path`, creating the directory if needed.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a key to a path directly under the root.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        // A leading dot is reserved for in-flight uploads.
        if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
            return Err(AppError::validation(format!("Invalid storage key: {key:?}")));
        }
        Ok(self.root.join(key))
    }
}

const PARTIAL_SUFFIX: &str = ".partial";

/// Removes an unfinished upload if dropped before [`PartialFile::persist`].
///
/// Covers both stream errors and the request future being cancelled.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    async fn persist(mut self, target: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, target).await?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to discard partial upload")
            }
        }
    }
}

fn io_error(action: &str, key: &str, e: std::io::Error) -> AppError {
    AppError::with_source(ErrorKind::Storage, format!("Failed to {action}: {key}"), e)
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn put_stream(&self, key: &str, mut stream: ByteStream) -> AppResult<u64> {
        let target = self.resolve(key)?;
        let partial_path = self.root.join(format!(".{key}{PARTIAL_SUFFIX}"));

        let mut file = fs::File::create(&partial_path)
            .await
            .map_err(|e| io_error("create file", key, e))?;
        let partial = PartialFile::new(partial_path);

        // One chunk is pulled only after the previous write completes.
        let mut total_bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Upload stream failed", e))?;
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| io_error("write chunk", key, e))?;
        }

        file.flush()
            .await
            .map_err(|e| io_error("flush file", key, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_error("sync file", key, e))?;
        drop(file);

        partial
            .persist(&target)
            .await
            .map_err(|e| io_error("finalize file", key, e))?;

        debug!(key, bytes = total_bytes, "Stored object from stream");
        Ok(total_bytes)
    }

    async fn upload_url(&self, _key: &str, _content_type: &str, _ttl: Duration) -> AppResult<String> {
        Err(AppError::not_implemented(
            "Local storage receives uploads through the streaming endpoint",
        ))
    }

    async fn download(&self, key: &str, _request: &DownloadRequest) -> AppResult<DownloadTarget> {
        let path = self.resolve(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {key}"))
            } else {
                io_error("open file", key, e)
            }
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|e| io_error("read metadata", key, e))?
            .len();

        Ok(DownloadTarget::Stream {
            stream: Box::pin(ReaderStream::new(file)),
            size,
        })
    }

    async fn object_size(&self, key: &str) -> AppResult<Option<u64>> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read metadata", key, e)),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete file", key, e)),
        }
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!(key = %key, error = %e, "Failed to delete object");
                first_error.get_or_insert(e);
            }
        }
        debug!(count = keys.len(), "Deleted objects");
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cloudbox_core::traits::storage::Disposition;
    use futures::stream;

    fn chunks(parts: &[&'static str]) -> ByteStream {
        let items: Vec<Result<Bytes, std::io::Error>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        Box::pin(stream::iter(items))
    }

    async fn backend() -> (tempfile::TempDir, LocalStorageBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path().to_str().unwrap())
            .await
            .unwrap();
        (dir, backend)
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            filename: "hello.txt".to_string(),
            disposition: Disposition::Attachment,
            content_type: None,
            ttl: Duration::from_secs(600),
        }
    }

    #[tokio::test]
    async fn test_put_download_delete() {
        let (_dir, backend) = backend().await;

        let written = backend
            .put_stream("abc.txt", chunks(&["hello ", "world"]))
            .await
            .unwrap();
        assert_eq!(written, 11);
        assert_eq!(backend.object_size("abc.txt").await.unwrap(), Some(11));

        match backend.download("abc.txt", &request()).await.unwrap() {
            DownloadTarget::Stream { mut stream, size } => {
                assert_eq!(size, 11);
                let mut body = Vec::new();
                while let Some(chunk) = stream.next().await {
                    body.extend_from_slice(&chunk.unwrap());
                }
                assert_eq!(body, b"hello world");
            }
            other => panic!("expected a stream, got {other:?}"),
        }

        backend.delete("abc.txt").await.unwrap();
        assert_eq!(backend.object_size("abc.txt").await.unwrap(), None);
        backend.delete("abc.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_error_discards_partial_object() {
        let (dir, backend) = backend().await;
        let items: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ];

        let err = backend
            .put_stream("broken.bin", Box::pin(stream::iter(items)))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert_eq!(backend.object_size("broken.bin").await.unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_delete_many_ignores_missing() {
        let (_dir, backend) = backend().await;
        backend.put_stream("a.txt", chunks(&["a"])).await.unwrap();
        backend.put_stream("b.txt", chunks(&["b"])).await.unwrap();

        backend
            .delete_many(&["a.txt".to_string(), "b.txt".to_string(), "c.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(backend.object_size("a.txt").await.unwrap(), None);
        assert_eq!(backend.object_size("b.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (_dir, backend) = backend().await;
        for key in ["../escape", "nested/key", "..", ""] {
            let err = backend.object_size(key).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation, "key {key:?}");
        }
    }

    #[tokio::test]
    async fn test_upload_url_is_not_supported() {
        let (_dir, backend) = backend().await;
        let err = backend
            .upload_url("a.txt", "text/plain", Duration::from_secs(600))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotImplemented);
        assert_eq!(backend.kind(), BackendKind::Local);
        assert!(backend.health_check().await.unwrap());
    }
}
