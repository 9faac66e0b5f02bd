//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A file stored in Cloudbox.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: Uuid,
    /// The file name (including extension).
    pub name: String,
    /// Size in bytes. Declared size while uploading, verified size afterwards.
    pub size: i64,
    /// Extension captured at creation, including the leading dot.
    pub extension: String,
    /// MIME type supplied by the uploader.
    pub content_type: Option<String>,
    /// The owner.
    pub user_id: Uuid,
    /// The directory containing this file.
    pub parent_dir_id: Uuid,
    /// The parent's materialized path at creation time.
    pub path: Vec<Uuid>,
    /// True until the payload is confirmed and the size counted.
    pub is_uploading: bool,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// Key of the payload in the storage backend.
    ///
    /// Fixed at creation: renaming a file never moves its object.
    pub fn storage_key(&self) -> String {
        storage_key(self.id, &self.extension)
    }

    /// Check whether the file has been committed.
    pub fn is_committed(&self) -> bool {
        !self.is_uploading
    }

    /// Size as an unsigned byte count.
    pub fn size_bytes(&self) -> u64 {
        u64::try_from(self.size).unwrap_or(0)
    }

    /// Extract the extension of `name`, including the leading dot.
    ///
    /// Returns an empty string when the name has no extension. A leading dot
    /// (`.bashrc`) or a trailing dot (`notes.`) does not count as one.
    pub fn extension_of(name: &str) -> String {
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => name[idx..].to_string(),
            _ => String::new(),
        }
    }
}

/// Build the storage key for a file id and extension.
pub fn storage_key(id: Uuid, extension: &str) -> String {
    format!("{id}{extension}")
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    /// Pre-assigned id so the storage key is known before insert.
    pub id: Uuid,
    /// The file name.
    pub name: String,
    /// Declared size in bytes.
    pub size: i64,
    /// Derived extension.
    pub extension: String,
    /// MIME type.
    pub content_type: Option<String>,
    /// The owner.
    pub user_id: Uuid,
    /// Target directory.
    pub parent_dir_id: Uuid,
    /// The parent directory's materialized path.
    pub path: Vec<Uuid>,
}

impl CreateFile {
    /// Key the payload will be stored under.
    pub fn storage_key(&self) -> String {
        storage_key(self.id, &self.extension)
    }
}
