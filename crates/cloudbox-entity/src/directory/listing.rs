//! Directory listing value objects returned to clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::Directory;
use crate::file::File;

/// One resolved element of a materialized path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Directory id.
    pub id: Uuid,
    /// Directory name at the time of listing.
    pub name: String,
}

/// A subdirectory with its breadcrumb trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// The directory row.
    #[serde(flatten)]
    pub directory: Directory,
    /// Resolved `path`.
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// A file with its breadcrumb trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// The file row.
    #[serde(flatten)]
    pub file: File,
    /// Resolved `path`.
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// Contents of one directory, each side sorted by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// The listed directory.
    #[serde(flatten)]
    pub directory: Directory,
    /// Resolved `path` of the listed directory.
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Immediate subdirectories.
    pub directories: Vec<DirectoryEntry>,
    /// Immediate files.
    pub files: Vec<FileEntry>,
}
