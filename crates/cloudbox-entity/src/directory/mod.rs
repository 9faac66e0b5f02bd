//! Directory entities and listing value objects.

pub mod listing;
pub mod model;

pub use listing::{Breadcrumb, DirectoryEntry, DirectoryListing, FileEntry};
pub use model::{CreateDirectory, DEFAULT_DIRECTORY_NAME, Directory};
