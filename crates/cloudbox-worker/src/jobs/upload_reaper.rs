//! Removal of abandoned pending uploads.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use cloudbox_core::config::WorkerConfig;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::storage::StorageBackend;
use cloudbox_database::repositories::FileRepository;

/// Outcome of one reaper pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Pending rows older than the cutoff.
    pub found: usize,
    /// Rows actually removed (a concurrent commit can win the race).
    pub removed: usize,
}

/// Deletes pending files older than the configured TTL.
///
/// Pending files never counted toward any directory size, so nothing is
/// propagated.
#[derive(Debug, Clone)]
pub struct UploadReaper {
    /// File repository.
    files: Arc<dyn FileRepository>,
    /// Object storage.
    storage: Arc<dyn StorageBackend>,
    /// Age at which a pending upload is abandoned.
    ttl: Duration,
}

impl UploadReaper {
    /// Create a reaper from worker configuration.
    pub fn new(
        files: Arc<dyn FileRepository>,
        storage: Arc<dyn StorageBackend>,
        config: &WorkerConfig,
    ) -> Self {
        let ttl_seconds = i64::try_from(config.pending_upload_ttl_seconds).unwrap_or(i64::MAX);
        Self {
            files,
            storage,
            ttl: Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        }
    }

    /// Reap uploads that went stale as of now.
    pub async fn run(&self) -> AppResult<ReapReport> {
        self.run_at(Utc::now()).await
    }

    /// Reap uploads created before `now - ttl`.
    ///
    /// Each row is removed only while still pending, and only the objects
    /// of removed rows are deleted, so an upload committed mid-pass keeps
    /// its bytes.
    pub async fn run_at(&self, now: DateTime<Utc>) -> AppResult<ReapReport> {
        let cutoff = now
            .checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let stale = self.files.find_stale_pending(cutoff).await?;
        if stale.is_empty() {
            tracing::debug!("No abandoned uploads");
            return Ok(ReapReport::default());
        }

        let mut keys = Vec::with_capacity(stale.len());
        for file in &stale {
            match self.files.discard_pending(file.id).await {
                Ok(true) => keys.push(file.storage_key()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(file_id = %file.id, error = %e, "Failed to reap pending file");
                }
            }
        }

        if !keys.is_empty() {
            if let Err(e) = self.storage.delete_many(&keys).await {
                tracing::warn!(objects = keys.len(), error = %e, "Failed to delete reaped objects");
            }
        }

        let report = ReapReport {
            found: stale.len(),
            removed: keys.len(),
        };
        tracing::info!(
            found = report.found,
            removed = report.removed,
            cutoff = %cutoff,
            "Abandoned uploads reaped"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudbox_core::traits::storage::BackendKind;
    use cloudbox_database::Repositories;
    use cloudbox_database::repositories::UserRepository;
    use cloudbox_entity::file::{CreateFile, File};
    use cloudbox_entity::user::CreateUser;
    use cloudbox_storage::providers::MemoryStorageBackend;
    use uuid::Uuid;

    async fn pending_file(repos: &Repositories, name: &str) -> File {
        let (user, root) = repos
            .users
            .create_with_root(
                &CreateUser {
                    name: name.to_string(),
                    email: format!("{name}@example.com"),
                    max_storage_bytes: 1024,
                },
                &format!("root-{name}@example.com"),
            )
            .await
            .unwrap();
        repos
            .files
            .create(&CreateFile {
                id: Uuid::new_v4(),
                name: "upload.bin".to_string(),
                size: 3,
                extension: ".bin".to_string(),
                content_type: None,
                user_id: user.id,
                parent_dir_id: root.id,
                path: root.path.clone(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reaps_only_stale_pending_files() {
        let repos = Repositories::memory();
        let storage = MemoryStorageBackend::new(BackendKind::Remote);
        let reaper = UploadReaper::new(
            repos.files.clone(),
            Arc::new(storage.clone()),
            &WorkerConfig::default(),
        );

        let abandoned = pending_file(&repos, "abandoned").await;
        let committed = pending_file(&repos, "committed").await;
        storage.put_object(&abandoned.storage_key(), &b"abc"[..]);
        storage.put_object(&committed.storage_key(), &b"abc"[..]);
        repos.files.commit(committed.id, 3).await.unwrap();

        // Nothing is old enough yet.
        assert_eq!(reaper.run().await.unwrap(), ReapReport::default());

        let later = Utc::now() + Duration::hours(2);
        let report = reaper.run_at(later).await.unwrap();
        assert_eq!(report, ReapReport { found: 1, removed: 1 });

        assert!(repos.files.find_by_id(abandoned.id).await.unwrap().is_none());
        assert!(!storage.contains(&abandoned.storage_key()));
        assert!(repos.files.find_by_id(committed.id).await.unwrap().is_some());
        assert!(storage.contains(&committed.storage_key()));
        assert_eq!(storage.delete_many_calls(), 1);
    }
}
