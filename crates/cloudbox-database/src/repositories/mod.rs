//! Repository traits and their implementations.
//!
//! Services depend on the traits only. [`Repositories::postgres`] wires the
//! sqlx-backed implementations; [`Repositories::memory`] wires a single
//! in-process store used by tests and by `database.provider = "memory"`.

pub mod directory;
pub mod file;
pub mod memory;
pub mod user;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cloudbox_core::result::AppResult;
use cloudbox_entity::directory::{CreateDirectory, Directory};
use cloudbox_entity::file::{CreateFile, File};
use cloudbox_entity::user::{CreateUser, User};

pub use directory::PgDirectoryRepository;
pub use file::PgFileRepository;
pub use memory::MemoryRepository;
pub use user::PgUserRepository;

/// Persistence for the directory tree.
#[async_trait]
pub trait DirectoryRepository: Send + Sync + Debug + 'static {
    /// Find a directory by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Directory>>;

    /// Direct subdirectories of `parent_id`, sorted by name.
    async fn find_children(&self, parent_id: Uuid) -> AppResult<Vec<Directory>>;

    /// Every directory whose materialized path passes through `root_id`,
    /// excluding `root_id` itself. Unordered.
    async fn find_descendants(&self, root_id: Uuid) -> AppResult<Vec<Directory>>;

    /// Names of the given directories, for breadcrumb rendering.
    async fn find_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>>;

    /// Insert a directory with `size = 0`.
    async fn create(&self, data: &CreateDirectory) -> AppResult<Directory>;

    /// Change a directory's name.
    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Directory>;

    /// Atomically add `delta` to the size of `start_dir_id` and every
    /// ancestor up to the root. Returns the number of directories updated.
    async fn add_size(&self, start_dir_id: Uuid, delta: i64) -> AppResult<u64>;

    /// In one transaction: delete `file_ids`, delete `directory_ids`, and
    /// subtract the root's current size from the ancestors of `root`.
    ///
    /// `directory_ids` must include `root.id`.
    async fn delete_subtree(
        &self,
        root: &Directory,
        directory_ids: &[Uuid],
        file_ids: &[Uuid],
    ) -> AppResult<()>;
}

/// Persistence for file records.
#[async_trait]
pub trait FileRepository: Send + Sync + Debug + 'static {
    /// Find a file by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>>;

    /// Files directly inside `dir_id`, sorted by name.
    async fn find_in_directory(&self, dir_id: Uuid) -> AppResult<Vec<File>>;

    /// Files directly inside any of `dir_ids`, unordered.
    async fn find_in_directories(&self, dir_ids: &[Uuid]) -> AppResult<Vec<File>>;

    /// Insert a pending (`is_uploading = true`) file.
    async fn create(&self, data: &CreateFile) -> AppResult<File>;

    /// In one transaction: mark a pending file committed with its final
    /// `size` and add that size to its ancestors.
    ///
    /// Returns `None` if the file does not exist or is already committed.
    async fn commit(&self, id: Uuid, size: i64) -> AppResult<Option<File>>;

    /// Change a file's name.
    async fn rename(&self, id: Uuid, name: &str) -> AppResult<File>;

    /// In one transaction: delete a file and, if it was committed,
    /// subtract its size from its ancestors.
    ///
    /// Returns the deleted row, or `None` if it was already gone.
    async fn delete(&self, id: Uuid) -> AppResult<Option<File>>;

    /// Delete a file only while it is still pending. Returns whether a row
    /// was removed.
    async fn discard_pending(&self, id: Uuid) -> AppResult<bool>;

    /// Pending files created before `cutoff`.
    async fn find_stale_pending(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<File>>;
}

/// Persistence for accounts.
#[async_trait]
pub trait UserRepository: Send + Sync + Debug + 'static {
    /// Find a user by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// In one transaction: insert the user and their root directory named
    /// `root_name`. The first account ever created becomes `owner`.
    async fn create_with_root(&self, data: &CreateUser, root_name: &str)
    -> AppResult<(User, Directory)>;

    /// In one transaction: delete every file, every directory, and the user.
    ///
    /// Returns the storage keys of the deleted files, or `None` if the user
    /// does not exist.
    async fn hard_delete(&self, id: Uuid) -> AppResult<Option<Vec<String>>>;
}

/// The set of repositories a running service uses.
#[derive(Debug, Clone)]
pub struct Repositories {
    /// Directory tree.
    pub directories: Arc<dyn DirectoryRepository>,
    /// File records.
    pub files: Arc<dyn FileRepository>,
    /// Accounts.
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            directories: Arc::new(PgDirectoryRepository::new(pool.clone())),
            files: Arc::new(PgFileRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool)),
        }
    }

    /// In-memory repositories sharing one store.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryRepository::new());
        Self {
            directories: store.clone(),
            files: store.clone(),
            users: store,
        }
    }
}
