//! Per-user storage quota and the absolute per-file ceiling.

use cloudbox_core::config::StorageConfig;
use cloudbox_core::error::AppError;
use cloudbox_entity::directory::Directory;
use cloudbox_entity::user::User;

/// Admission check run before any bytes are accepted.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    /// Largest single file accepted regardless of quota.
    max_file_size_bytes: u64,
}

impl QuotaPolicy {
    /// Create a policy with the given per-file ceiling.
    pub fn new(max_file_size_bytes: u64) -> Self {
        Self {
            max_file_size_bytes,
        }
    }

    /// Create a policy from storage configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.max_file_size_bytes)
    }

    /// The per-file ceiling.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    /// Bytes `owner` can still store, given their root directory.
    pub fn available(owner: &User, root: &Directory) -> u64 {
        owner
            .quota_bytes()
            .saturating_sub(u64::try_from(root.size).unwrap_or(0))
    }

    /// Reject `declared` bytes if they exceed the ceiling or what the
    /// owner has left.
    pub fn check(&self, owner: &User, root: &Directory, declared: u64) -> Result<(), AppError> {
        let available = Self::available(owner, root);
        if declared > self.max_file_size_bytes || declared > available {
            tracing::debug!(
                user_id = %owner.id,
                declared,
                available,
                ceiling = self.max_file_size_bytes,
                "Upload rejected by quota"
            );
            return Err(AppError::quota_exceeded(
                declared,
                available.min(self.max_file_size_bytes),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cloudbox_core::error::ErrorKind;
    use cloudbox_entity::user::UserRole;
    use uuid::Uuid;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn owner_with_usage(max: u64, used: u64) -> (User, Directory) {
        let user_id = Uuid::new_v4();
        let root_id = Uuid::new_v4();
        let user = User {
            id: user_id,
            name: "quota".to_string(),
            email: "quota@example.com".to_string(),
            role: UserRole::User,
            root_dir_id: root_id,
            max_storage_bytes: max as i64,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let root = Directory {
            id: root_id,
            name: "root-quota@example.com".to_string(),
            parent_dir_id: None,
            user_id,
            path: vec![root_id],
            size: used as i64,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (user, root)
    }

    #[test]
    fn test_rejects_upload_larger_than_remaining_quota() {
        let (user, root) = owner_with_usage(10 * GIB, 9 * GIB);
        let policy = QuotaPolicy::new(50 * GIB);

        let err = policy.check(&user, &root, 2 * GIB).unwrap_err();
        assert_eq!(err.kind, ErrorKind::QuotaExceeded);
        assert!(err.message.contains(&format!("{} bytes available", GIB)));

        assert!(policy.check(&user, &root, GIB).is_ok());
    }

    #[test]
    fn test_rejects_above_ceiling_even_with_quota() {
        let (user, root) = owner_with_usage(100 * GIB, 0);
        let policy = QuotaPolicy::new(50 * GIB);
        assert!(policy.check(&user, &root, 51 * GIB).is_err());
        assert!(policy.check(&user, &root, 50 * GIB).is_ok());
    }

    #[test]
    fn test_over_quota_usage_leaves_nothing_available() {
        let (user, root) = owner_with_usage(GIB, 2 * GIB);
        assert_eq!(QuotaPolicy::available(&user, &root), 0);
        assert!(QuotaPolicy::new(50 * GIB).check(&user, &root, 1).is_err());
        assert!(QuotaPolicy::new(50 * GIB).check(&user, &root, 0).is_ok());
    }
}
