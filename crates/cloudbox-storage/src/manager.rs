//! Backend selection: builds the one storage backend a process runs with.

use std::sync::Arc;

use tracing::info;

use cloudbox_core::config::StorageConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::StorageBackend;

/// Connect the backend named by `config.backend`.
///
/// The returned backend is shared by every request for the life of the
/// process; handlers never pick a backend per call.
pub async fn connect(config: &StorageConfig) -> AppResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.backend.as_str() {
        #[cfg(feature = "local")]
        "local" => Arc::new(
            crate::providers::LocalStorageBackend::new(&config.local.root_path).await?,
        ),
        #[cfg(feature = "s3")]
        "s3" => Arc::new(crate::providers::S3StorageBackend::new(&config.s3).await?),
        #[cfg(feature = "mock")]
        "memory" => Arc::new(crate::providers::MemoryStorageBackend::new(
            cloudbox_core::traits::storage::BackendKind::Local,
        )),
        other => {
            return Err(AppError::configuration(format!(
                "Unknown or disabled storage backend: '{other}'"
            )));
        }
    };

    info!(backend = %config.backend, kind = %backend.kind(), "Storage backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudbox_core::error::ErrorKind;
    use cloudbox_core::traits::storage::BackendKind;

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let config = StorageConfig {
            backend: "ftp".to_string(),
            ..StorageConfig::default()
        };
        let err = connect(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[cfg(feature = "local")]
    #[tokio::test]
    async fn test_local_backend_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorageConfig::default();
        config.local.root_path = dir.path().join("objects").to_string_lossy().into_owned();

        let backend = connect(&config).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Local);
        assert!(dir.path().join("objects").is_dir());
    }
}
