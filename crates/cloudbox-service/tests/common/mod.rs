//! Shared harness for service tests: in-memory repositories plus the
//! in-memory storage backend.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use futures::stream;

use cloudbox_core::config::StorageConfig;
use cloudbox_core::traits::storage::{BackendKind, ByteStream};
use cloudbox_database::Repositories;
use cloudbox_entity::directory::Directory;
use cloudbox_service::account::Registration;
use cloudbox_service::{
    AccountService, DirectoryService, FileService, RequestContext, UploadService,
};
use cloudbox_storage::providers::MemoryStorageBackend;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Every service wired against one in-memory store.
pub struct Harness {
    pub repos: Repositories,
    pub storage: MemoryStorageBackend,
    pub directories: DirectoryService,
    pub files: FileService,
    pub uploads: UploadService,
    pub accounts: AccountService,
}

impl Harness {
    /// Harness whose accounts get a 1 GiB quota.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_quota(kind, GIB)
    }

    /// Harness whose accounts get `quota` bytes.
    pub fn with_quota(kind: BackendKind, quota: u64) -> Self {
        let config = StorageConfig {
            default_quota_bytes: quota,
            ..StorageConfig::default()
        };
        let repos = Repositories::memory();
        let storage = MemoryStorageBackend::new(kind);
        let backend: Arc<dyn cloudbox_core::traits::storage::StorageBackend> =
            Arc::new(storage.clone());

        let files = FileService::new(&repos, backend.clone(), &config);
        Self {
            directories: DirectoryService::new(&repos, backend.clone()),
            uploads: UploadService::new(&repos, files.clone()),
            accounts: AccountService::new(&repos, backend, &config),
            files,
            storage,
            repos,
        }
    }

    /// Register an account and return a context acting as it.
    pub async fn register(&self, email: &str) -> RequestContext {
        let (user, _) = self
            .accounts
            .register(Registration {
                name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
            })
            .await
            .unwrap();
        RequestContext::new(user)
    }

    /// Current state of a directory.
    pub async fn directory(&self, id: uuid::Uuid) -> Directory {
        self.directories.find(id).await.unwrap()
    }

    /// Current size of the actor's root directory.
    pub async fn root_size(&self, ctx: &RequestContext) -> i64 {
        self.directory(ctx.actor.root_dir_id).await.size
    }
}

/// A request body made of the given chunks.
pub fn body(parts: &[&'static str]) -> ByteStream {
    let items: Vec<Result<Bytes, std::io::Error>> = parts
        .iter()
        .map(|p| Ok(Bytes::from_static(p.as_bytes())))
        .collect();
    Box::pin(stream::iter(items))
}
