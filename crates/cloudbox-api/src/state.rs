//! Application state shared across all handlers.

use std::sync::Arc;

use cloudbox_auth::JwtDecoder;
use cloudbox_core::config::AppConfig;
use cloudbox_core::traits::storage::StorageBackend;
use cloudbox_database::Repositories;
use cloudbox_service::{AccountService, DirectoryService, FileService, UploadService};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// The storage backend chosen at startup
    pub storage: Arc<dyn StorageBackend>,
    /// Repositories
    pub repos: Repositories,
    /// Bearer token verification
    pub jwt_decoder: Arc<JwtDecoder>,
    /// Directory tree operations
    pub directory_service: Arc<DirectoryService>,
    /// File lifecycle operations
    pub file_service: Arc<FileService>,
    /// Upload protocols
    pub upload_service: Arc<UploadService>,
    /// Accounts and usage
    pub account_service: Arc<AccountService>,
}

impl AppState {
    /// Wire every service over the given repositories and backend.
    pub fn new(config: AppConfig, repos: Repositories, storage: Arc<dyn StorageBackend>) -> Self {
        let file_service = FileService::new(&repos, Arc::clone(&storage), &config.storage);
        let upload_service = UploadService::new(&repos, file_service.clone());
        let directory_service = DirectoryService::new(&repos, Arc::clone(&storage));
        let account_service = AccountService::new(&repos, Arc::clone(&storage), &config.storage);
        let jwt_decoder = JwtDecoder::new(&config.auth);

        Self {
            config: Arc::new(config),
            storage,
            repos,
            jwt_decoder: Arc::new(jwt_decoder),
            directory_service: Arc::new(directory_service),
            file_service: Arc::new(file_service),
            upload_service: Arc::new(upload_service),
            account_service: Arc::new(account_service),
        }
    }
}
