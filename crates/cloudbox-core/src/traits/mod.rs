//! Core trait definitions implemented by other Cloudbox crates.

pub mod storage;

pub use storage::{
    BackendKind, ByteStream, Disposition, DownloadRequest, DownloadTarget, StorageBackend,
};
