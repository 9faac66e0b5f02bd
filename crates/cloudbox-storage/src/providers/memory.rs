//! In-process storage backend for tests.
//!
//! Behaves like either backend kind: as [`BackendKind::Local`] it accepts
//! streamed uploads and serves streams, as [`BackendKind::Remote`] it hands
//! out `memory://` URLs and expects objects to arrive via [`MemoryStorageBackend::put_object`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::{
    BackendKind, ByteStream, DownloadRequest, DownloadTarget, StorageBackend,
};

/// Object store held in a concurrent map.
#[derive(Debug, Clone)]
pub struct MemoryStorageBackend {
    kind: BackendKind,
    objects: Arc<DashMap<String, Bytes>>,
    delete_many_calls: Arc<AtomicUsize>,
}

impl MemoryStorageBackend {
    /// Create an empty store that reports itself as `kind`.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            objects: Arc::new(DashMap::new()),
            delete_many_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Place an object directly, as a client holding an upload URL would.
    pub fn put_object(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.insert(key.to_string(), data.into());
    }

    /// Whether an object exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Stored bytes for `key`.
    pub fn get_object(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// How many times [`StorageBackend::delete_many`] has been called.
    pub fn delete_many_calls(&self) -> usize {
        self.delete_many_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn put_stream(&self, key: &str, mut stream: ByteStream) -> AppResult<u64> {
        if self.kind != BackendKind::Local {
            return Err(AppError::not_implemented(
                "Remote storage receives uploads through presigned URLs",
            ));
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Upload stream failed", e))?;
            buffer.extend_from_slice(&chunk);
        }

        let written = buffer.len() as u64;
        self.objects.insert(key.to_string(), buffer.freeze());
        Ok(written)
    }

    async fn upload_url(&self, key: &str, _content_type: &str, _ttl: Duration) -> AppResult<String> {
        if self.kind != BackendKind::Remote {
            return Err(AppError::not_implemented(
                "Local storage receives uploads through the streaming endpoint",
            ));
        }
        Ok(format!("memory://{key}"))
    }

    async fn download(&self, key: &str, request: &DownloadRequest) -> AppResult<DownloadTarget> {
        let data = self
            .get_object(key)
            .ok_or_else(|| AppError::not_found(format!("Object not found: {key}")))?;

        match self.kind {
            BackendKind::Remote => Ok(DownloadTarget::Redirect {
                url: format!(
                    "memory://{key}?disposition={}",
                    request.disposition.header_value(&request.filename)
                ),
            }),
            BackendKind::Local => {
                let size = data.len() as u64;
                let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(data)];
                Ok(DownloadTarget::Stream {
                    stream: Box::pin(stream::iter(chunks)),
                    size,
                })
            }
        }
    }

    async fn object_size(&self, key: &str) -> AppResult<Option<u64>> {
        Ok(self.objects.get(key).map(|entry| entry.value().len() as u64))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.objects.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<()> {
        self.delete_many_calls.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            self.objects.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudbox_core::traits::storage::Disposition;

    #[tokio::test]
    async fn test_remote_kind_issues_urls_and_redirects() {
        let backend = MemoryStorageBackend::new(BackendKind::Remote);
        let url = backend
            .upload_url("k.txt", "text/plain", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url, "memory://k.txt");

        backend.put_object("k.txt", &b"abc"[..]);
        assert_eq!(backend.object_size("k.txt").await.unwrap(), Some(3));

        let request = DownloadRequest {
            filename: "k.txt".to_string(),
            disposition: Disposition::Attachment,
            content_type: None,
            ttl: Duration::from_secs(60),
        };
        let target = backend.download("k.txt", &request).await.unwrap();
        assert!(matches!(target, DownloadTarget::Redirect { .. }));
    }

    #[tokio::test]
    async fn test_delete_many_counts_calls() {
        let backend = MemoryStorageBackend::new(BackendKind::Local);
        backend.put_object("a", &b"1"[..]);
        backend.put_object("b", &b"2"[..]);

        backend
            .delete_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(backend.delete_many_calls(), 1);
        assert_eq!(backend.object_count(), 0);
    }
}
