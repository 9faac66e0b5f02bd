//! Storage backend trait for the object store behind uploaded files.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// A byte stream type used for reading and writing file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Which upload protocol a backend supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Bytes pass through the server and are streamed to disk.
    Local,
    /// Clients move bytes directly via presigned URLs.
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// How a browser should treat a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Render in the browser when possible.
    #[default]
    Inline,
    /// Force a save dialog.
    Attachment,
}

impl Disposition {
    /// Render a `Content-Disposition` header value for `filename`.
    pub fn header_value(&self, filename: &str) -> String {
        let kind = match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        };
        let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{kind}; filename=\"{escaped}\"")
    }
}

/// Parameters for resolving a download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Name presented to the client.
    pub filename: String,
    /// Inline or attachment.
    pub disposition: Disposition,
    /// MIME type recorded at upload, if any.
    pub content_type: Option<String>,
    /// Lifetime of a presigned URL.
    pub ttl: Duration,
}

/// Where the client should fetch the bytes from.
pub enum DownloadTarget {
    /// A time-limited presigned URL to redirect to.
    Redirect {
        /// The signed URL.
        url: String,
    },
    /// The bytes themselves, streamed by the server.
    Stream {
        /// File contents.
        stream: ByteStream,
        /// Content length.
        size: u64,
    },
}

impl fmt::Debug for DownloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redirect { url } => f.debug_struct("Redirect").field("url", url).finish(),
            Self::Stream { size, .. } => f
                .debug_struct("Stream")
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// Uniform interface over the object store holding file payloads.
///
/// Defined here in `cloudbox-core` and implemented in `cloudbox-storage`.
/// Exactly one backend is chosen at process start and shared as
/// `Arc<dyn StorageBackend>`.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug + 'static {
    /// Which upload protocol this backend serves.
    fn kind(&self) -> BackendKind;

    /// Check whether the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Stream bytes into `key`, returning the number of bytes written.
    ///
    /// The object becomes visible only if the stream ends cleanly. An error
    /// item from the stream aborts the write and discards the partial data.
    async fn put_stream(&self, key: &str, stream: ByteStream) -> AppResult<u64>;

    /// Issue a presigned URL the client can `PUT` the object to.
    async fn upload_url(&self, key: &str, content_type: &str, ttl: Duration) -> AppResult<String>;

    /// Resolve how the client retrieves `key`.
    async fn download(&self, key: &str, request: &DownloadRequest) -> AppResult<DownloadTarget>;

    /// Return the stored size of `key`, or `None` if it does not exist.
    async fn object_size(&self, key: &str) -> AppResult<Option<u64>>;

    /// Delete one object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Delete many objects in as few backend calls as possible.
    async fn delete_many(&self, keys: &[String]) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_header_value() {
        assert_eq!(
            Disposition::Attachment.header_value("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
        assert_eq!(
            Disposition::Inline.header_value("say \"hi\".txt"),
            "inline; filename=\"say \\\"hi\\\".txt\""
        );
    }
}
