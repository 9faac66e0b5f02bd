//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::role::UserRole;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Unique email address.
    pub email: String,
    /// Administrative role.
    pub role: UserRole,
    /// The user's root directory.
    pub root_dir_id: Uuid,
    /// Quota in bytes.
    pub max_storage_bytes: i64,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Quota as an unsigned byte count.
    pub fn quota_bytes(&self) -> u64 {
        u64::try_from(self.max_storage_bytes).unwrap_or(0)
    }
}

/// Data required to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Quota in bytes.
    pub max_storage_bytes: i64,
}

/// Quota usage for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    /// Quota in bytes.
    pub max_storage_in_bytes: u64,
    /// Size of the root directory.
    pub used_storage_in_bytes: u64,
    /// Bytes that can still be uploaded.
    pub available_bytes: u64,
}

impl StorageUsage {
    /// Compute usage from a quota and the root directory size.
    pub fn new(max: u64, used: u64) -> Self {
        Self {
            max_storage_in_bytes: max,
            used_storage_in_bytes: used,
            available_bytes: max.saturating_sub(used),
        }
    }
}
