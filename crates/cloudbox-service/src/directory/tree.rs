//! Enumeration of a directory subtree.
//!
//! Descendants come back from one materialized-path query; the walk below
//! only orders them and enforces the depth limit.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_database::repositories::{DirectoryRepository, FileRepository};
use cloudbox_entity::directory::Directory;
use cloudbox_entity::file::File;

/// Deepest tree the service builds or walks, counted in path entries.
pub const MAX_TREE_DEPTH: usize = 256;

/// Everything below (and including) one directory.
#[derive(Debug, Clone, Default)]
pub struct Subtree {
    /// Root first, then descendants in depth-first order.
    pub directory_ids: Vec<Uuid>,
    /// Files in any of those directories, pending ones included.
    pub files: Vec<File>,
}

impl Subtree {
    /// Storage keys of every file in the subtree.
    pub fn storage_keys(&self) -> Vec<String> {
        self.files.iter().map(File::storage_key).collect()
    }

    /// Ids of every file in the subtree.
    pub fn file_ids(&self) -> Vec<Uuid> {
        self.files.iter().map(|f| f.id).collect()
    }
}

/// Collect `root` and all of its descendants.
pub async fn collect_subtree(
    directories: &dyn DirectoryRepository,
    files: &dyn FileRepository,
    root: &Directory,
) -> AppResult<Subtree> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for dir in directories.find_descendants(root.id).await? {
        if let Some(parent_id) = dir.parent_dir_id {
            children.entry(parent_id).or_default().push(dir.id);
        }
    }

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut directory_ids = Vec::new();
    let mut stack = vec![(root.id, 0usize)];

    while let Some((id, depth)) = stack.pop() {
        if depth >= MAX_TREE_DEPTH {
            return Err(AppError::validation(format!(
                "Directory tree below {} is deeper than {MAX_TREE_DEPTH} levels",
                root.id
            )));
        }
        if !seen.insert(id) {
            continue;
        }
        directory_ids.push(id);
        if let Some(ids) = children.get(&id) {
            stack.extend(ids.iter().rev().map(|child| (*child, depth + 1)));
        }
    }

    let files = files.find_in_directories(&directory_ids).await?;

    Ok(Subtree {
        directory_ids,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudbox_database::repositories::{MemoryRepository, UserRepository};
    use cloudbox_entity::directory::CreateDirectory;
    use cloudbox_entity::file::CreateFile;
    use cloudbox_entity::user::CreateUser;

    async fn seed(repo: &MemoryRepository) -> Directory {
        let (_, root) = repo
            .create_with_root(
                &CreateUser {
                    name: "tree".to_string(),
                    email: "tree@example.com".to_string(),
                    max_storage_bytes: 1024,
                },
                "root-tree@example.com",
            )
            .await
            .unwrap();
        root
    }

    async fn child(repo: &MemoryRepository, parent: &Directory, name: &str) -> Directory {
        DirectoryRepository::create(repo, &CreateDirectory::child_of(parent, name))
            .await
            .unwrap()
    }

    async fn file_in(repo: &MemoryRepository, parent: &Directory, name: &str) -> File {
        let id = Uuid::new_v4();
        FileRepository::create(
            repo,
            &CreateFile {
                id,
                name: name.to_string(),
                size: 1,
                extension: File::extension_of(name),
                content_type: None,
                user_id: parent.user_id,
                parent_dir_id: parent.id,
                path: parent.path.clone(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_collects_every_level() {
        let repo = MemoryRepository::new();
        let root = seed(&repo).await;
        let a = child(&repo, &root, "a").await;
        let b = child(&repo, &a, "b").await;
        let c = child(&repo, &b, "c").await;
        let sibling = child(&repo, &root, "sibling").await;
        file_in(&repo, &a, "one.txt").await;
        file_in(&repo, &c, "two.bin").await;
        file_in(&repo, &sibling, "outside.txt").await;

        let subtree = collect_subtree(&repo, &repo, &a).await.unwrap();
        assert_eq!(subtree.directory_ids, vec![a.id, b.id, c.id]);
        assert_eq!(subtree.files.len(), 2);
        assert!(subtree.storage_keys().iter().any(|k| k.ends_with(".bin")));
    }

    #[tokio::test]
    async fn test_depth_guard() {
        let repo = MemoryRepository::new();
        let root = seed(&repo).await;
        let mut parent = root.clone();
        for i in 0..MAX_TREE_DEPTH {
            parent = child(&repo, &parent, &format!("d{i}")).await;
        }

        let err = collect_subtree(&repo, &repo, &root).await.unwrap_err();
        assert_eq!(err.kind, cloudbox_core::error::ErrorKind::Validation);
    }
}
