//! In-memory repository implementation.
//!
//! Every table lives behind one [`RwLock`], so each trait method that the
//! PostgreSQL implementation runs as a transaction runs here inside a single
//! write-lock critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_entity::directory::{CreateDirectory, Directory};
use cloudbox_entity::file::{CreateFile, File};
use cloudbox_entity::user::{CreateUser, User, UserRole};

use super::{DirectoryRepository, FileRepository, UserRepository};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    directories: HashMap<Uuid, Directory>,
    files: HashMap<Uuid, File>,
}

impl MemoryState {
    /// Walk `parent_dir_id` links from `start` to the root, adding `delta`.
    fn add_size(&mut self, start: Uuid, delta: i64) -> u64 {
        let now = Utc::now();
        let mut updated = 0;
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let Some(dir) = self.directories.get_mut(&id) else {
                break;
            };
            dir.size += delta;
            dir.updated_at = now;
            updated += 1;
            cursor = dir.parent_dir_id;
        }
        updated
    }
}

/// Repositories backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| name(a).cmp(name(b)));
}

#[async_trait]
impl DirectoryRepository for MemoryRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Directory>> {
        Ok(self.state.read().await.directories.get(&id).cloned())
    }

    async fn find_children(&self, parent_id: Uuid) -> AppResult<Vec<Directory>> {
        let state = self.state.read().await;
        let mut children: Vec<Directory> = state
            .directories
            .values()
            .filter(|d| d.parent_dir_id == Some(parent_id))
            .cloned()
            .collect();
        sort_by_name(&mut children, |d| &d.name);
        Ok(children)
    }

    async fn find_descendants(&self, root_id: Uuid) -> AppResult<Vec<Directory>> {
        let state = self.state.read().await;
        Ok(state
            .directories
            .values()
            .filter(|d| d.id != root_id && d.path.contains(&root_id))
            .cloned()
            .collect())
    }

    async fn find_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.directories.get(id).map(|d| (*id, d.name.clone())))
            .collect())
    }

    async fn create(&self, data: &CreateDirectory) -> AppResult<Directory> {
        let mut state = self.state.write().await;
        if let Some(parent_id) = data
            .parent_dir_id
            .filter(|p| !state.directories.contains_key(p))
        {
            return Err(AppError::not_found(format!(
                "Directory {parent_id} not found"
            )));
        }
        if state.directories.contains_key(&data.id) {
            return Err(AppError::conflict(format!(
                "Directory {} already exists",
                data.id
            )));
        }
        let now = Utc::now();
        let directory = Directory {
            id: data.id,
            name: data.name.clone(),
            parent_dir_id: data.parent_dir_id,
            user_id: data.user_id,
            path: data.path.clone(),
            size: 0,
            created_at: now,
            updated_at: now,
        };
        state.directories.insert(directory.id, directory.clone());
        Ok(directory)
    }

    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Directory> {
        let mut state = self.state.write().await;
        let dir = state
            .directories
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Directory {id} not found")))?;
        dir.name = name.to_string();
        dir.updated_at = Utc::now();
        Ok(dir.clone())
    }

    async fn add_size(&self, start_dir_id: Uuid, delta: i64) -> AppResult<u64> {
        Ok(self.state.write().await.add_size(start_dir_id, delta))
    }

    async fn delete_subtree(
        &self,
        root: &Directory,
        directory_ids: &[Uuid],
        file_ids: &[Uuid],
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let size = state
            .directories
            .get(&root.id)
            .map(|d| d.size)
            .ok_or_else(|| AppError::not_found(format!("Directory {} not found", root.id)))?;

        // Same outcome as the foreign keys on Postgres: a row added under the
        // subtree after it was collected blocks the delete.
        let orphaned = state
            .files
            .values()
            .any(|f| directory_ids.contains(&f.parent_dir_id) && !file_ids.contains(&f.id))
            || state.directories.values().any(|d| {
                d.parent_dir_id.is_some_and(|p| directory_ids.contains(&p))
                    && !directory_ids.contains(&d.id)
            });
        if orphaned {
            return Err(subtree_changed(root.id));
        }

        for id in file_ids {
            state.files.remove(id);
        }
        for id in directory_ids {
            state.directories.remove(id);
        }
        if let Some(parent_id) = root.parent_dir_id.filter(|_| size != 0) {
            state.add_size(parent_id, -size);
        }
        Ok(())
    }
}

/// A row landed in the subtree between collection and deletion.
fn subtree_changed(dir_id: Uuid) -> AppError {
    AppError::conflict(format!(
        "Directory {dir_id} changed while it was being deleted; retry the delete"
    ))
}

#[async_trait]
impl FileRepository for MemoryRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn find_in_directory(&self, dir_id: Uuid) -> AppResult<Vec<File>> {
        let state = self.state.read().await;
        let mut files: Vec<File> = state
            .files
            .values()
            .filter(|f| f.parent_dir_id == dir_id)
            .cloned()
            .collect();
        sort_by_name(&mut files, |f| &f.name);
        Ok(files)
    }

    async fn find_in_directories(&self, dir_ids: &[Uuid]) -> AppResult<Vec<File>> {
        let state = self.state.read().await;
        Ok(state
            .files
            .values()
            .filter(|f| dir_ids.contains(&f.parent_dir_id))
            .cloned()
            .collect())
    }

    async fn create(&self, data: &CreateFile) -> AppResult<File> {
        let mut state = self.state.write().await;
        if !state.directories.contains_key(&data.parent_dir_id) {
            return Err(AppError::not_found(format!(
                "Directory {} not found",
                data.parent_dir_id
            )));
        }
        if state.files.contains_key(&data.id) {
            return Err(AppError::conflict(format!("File {} already exists", data.id)));
        }
        let now = Utc::now();
        let file = File {
            id: data.id,
            name: data.name.clone(),
            size: data.size,
            extension: data.extension.clone(),
            content_type: data.content_type.clone(),
            user_id: data.user_id,
            parent_dir_id: data.parent_dir_id,
            path: data.path.clone(),
            is_uploading: true,
            created_at: now,
            updated_at: now,
        };
        state.files.insert(file.id, file.clone());
        Ok(file)
    }

    async fn commit(&self, id: Uuid, size: i64) -> AppResult<Option<File>> {
        let mut state = self.state.write().await;
        let Some(file) = state.files.get_mut(&id).filter(|f| f.is_uploading) else {
            return Ok(None);
        };
        file.is_uploading = false;
        file.size = size;
        file.updated_at = Utc::now();
        let file = file.clone();
        state.add_size(file.parent_dir_id, file.size);
        Ok(Some(file))
    }

    async fn rename(&self, id: Uuid, name: &str) -> AppResult<File> {
        let mut state = self.state.write().await;
        let file = state
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        file.name = name.to_string();
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<File>> {
        let mut state = self.state.write().await;
        let deleted = state.files.remove(&id);
        if let Some(file) = deleted.as_ref().filter(|f| f.is_committed() && f.size != 0) {
            state.add_size(file.parent_dir_id, -file.size);
        }
        Ok(deleted)
    }

    async fn discard_pending(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let pending = state.files.get(&id).is_some_and(|f| f.is_uploading);
        if pending {
            state.files.remove(&id);
        }
        Ok(pending)
    }

    async fn find_stale_pending(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<File>> {
        let state = self.state.read().await;
        let mut stale: Vec<File> = state
            .files
            .values()
            .filter(|f| f.is_uploading && f.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|f| f.created_at);
        Ok(stale)
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create_with_root(
        &self,
        data: &CreateUser,
        root_name: &str,
    ) -> AppResult<(User, Directory)> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == data.email) {
            return Err(AppError::conflict(format!(
                "Email '{}' is already registered",
                data.email
            )));
        }

        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let root = CreateDirectory::root(user_id, root_name);
        let role = if state.users.is_empty() {
            UserRole::Owner
        } else {
            UserRole::User
        };

        let user = User {
            id: user_id,
            name: data.name.clone(),
            email: data.email.clone(),
            role,
            root_dir_id: root.id,
            max_storage_bytes: data.max_storage_bytes,
            created_at: now,
            updated_at: now,
        };
        let directory = Directory {
            id: root.id,
            name: root.name,
            parent_dir_id: None,
            user_id,
            path: root.path,
            size: 0,
            created_at: now,
            updated_at: now,
        };

        state.users.insert(user.id, user.clone());
        state.directories.insert(directory.id, directory.clone());
        Ok((user, directory))
    }

    async fn hard_delete(&self, id: Uuid) -> AppResult<Option<Vec<String>>> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Ok(None);
        }
        let file_ids: Vec<Uuid> = state
            .files
            .values()
            .filter(|f| f.user_id == id)
            .map(|f| f.id)
            .collect();
        let keys = file_ids
            .iter()
            .filter_map(|fid| state.files.remove(fid))
            .map(|f| f.storage_key())
            .collect();
        state.directories.retain(|_, d| d.user_id != id);
        Ok(Some(keys))
    }
}
