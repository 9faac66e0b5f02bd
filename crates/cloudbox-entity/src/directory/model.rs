//! Directory entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Name given to directories created or renamed with a blank name.
pub const DEFAULT_DIRECTORY_NAME: &str = "New Folder";

/// A directory in a user's tree.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Directory {
    /// Unique directory identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Parent directory (null for the user's root).
    pub parent_dir_id: Option<Uuid>,
    /// The owner.
    pub user_id: Uuid,
    /// Ancestor ids from the root down to and including this directory.
    pub path: Vec<Uuid>,
    /// Total bytes of committed files anywhere below this directory.
    pub size: i64,
    /// When the directory was created.
    pub created_at: DateTime<Utc>,
    /// When the directory was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Directory {
    /// Check if this is a root directory (no parent).
    pub fn is_root(&self) -> bool {
        self.parent_dir_id.is_none()
    }

    /// Depth in the tree (0 for the root).
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Materialized path for a new child with id `child_id`.
    pub fn child_path(&self, child_id: Uuid) -> Vec<Uuid> {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(child_id);
        path
    }
}

/// Data required to create a new directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDirectory {
    /// Pre-assigned id; it is already the last element of `path`.
    pub id: Uuid,
    /// Sanitized name.
    pub name: String,
    /// Parent directory (None for a root).
    pub parent_dir_id: Option<Uuid>,
    /// The owner.
    pub user_id: Uuid,
    /// Full materialized path, inclusive of `id`.
    pub path: Vec<Uuid>,
}

impl CreateDirectory {
    /// A root directory for `user_id`.
    pub fn root(user_id: Uuid, name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            parent_dir_id: None,
            user_id,
            path: vec![id],
        }
    }

    /// A child of `parent`, owned by the parent's owner.
    pub fn child_of(parent: &Directory, name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            parent_dir_id: Some(parent.id),
            user_id: parent.user_id,
            path: parent.child_path(id),
        }
    }
}
