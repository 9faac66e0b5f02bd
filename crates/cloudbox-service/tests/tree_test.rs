//! Directory tree, file lifecycle, access control and account tests.

mod common;

use cloudbox_core::error::ErrorKind;
use cloudbox_core::traits::storage::{BackendKind, Disposition, DownloadTarget};
use cloudbox_entity::file::File;
use cloudbox_entity::user::UserRole;
use cloudbox_service::RequestContext;
use cloudbox_service::directory::MAX_TREE_DEPTH;
use cloudbox_service::file::StreamUpload;
use uuid::Uuid;

use common::{Harness, body};

async fn upload(h: &Harness, ctx: &RequestContext, parent: Option<Uuid>, name: &str, data: &'static str) -> File {
    h.uploads
        .stream_upload(
            ctx,
            StreamUpload {
                parent_dir_id: parent,
                filename: Some(name.to_string()),
                declared_size: data.len() as u64,
                content_type: None,
            },
            body(&[data]),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_sizes_track_committed_files_through_mutations() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;
    let root = ctx.actor.root_dir_id;

    let docs = h.directories.create_directory(&ctx, None, Some("docs")).await.unwrap();
    let deep = h
        .directories
        .create_directory(&ctx, Some(docs.id), Some("deep"))
        .await
        .unwrap();
    assert_eq!(deep.path, vec![root, docs.id, deep.id]);

    let a = upload(&h, &ctx, Some(docs.id), "a.txt", "aaaa").await;
    upload(&h, &ctx, Some(deep.id), "b.txt", "bbbbbb").await;
    upload(&h, &ctx, None, "c.txt", "cc").await;

    assert_eq!(h.directory(deep.id).await.size, 6);
    assert_eq!(h.directory(docs.id).await.size, 10);
    assert_eq!(h.directory(root).await.size, 12);

    h.files.delete_file(&ctx, a.id).await.unwrap();
    assert_eq!(h.directory(docs.id).await.size, 6);
    assert_eq!(h.directory(root).await.size, 8);
    assert!(!h.storage.contains(&a.storage_key()));

    h.directories.delete_directory_subtree(&ctx, deep.id).await.unwrap();
    assert_eq!(h.directory(docs.id).await.size, 0);
    assert_eq!(h.directory(root).await.size, 2);
}

#[tokio::test]
async fn test_subtree_delete_issues_one_batched_delete() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;

    let top = h.directories.create_directory(&ctx, None, Some("top")).await.unwrap();
    let mid = h.directories.create_directory(&ctx, Some(top.id), None).await.unwrap();
    let leaf = h.directories.create_directory(&ctx, Some(mid.id), None).await.unwrap();
    let files = [
        upload(&h, &ctx, Some(top.id), "1.txt", "1").await,
        upload(&h, &ctx, Some(mid.id), "2.txt", "22").await,
        upload(&h, &ctx, Some(leaf.id), "3.txt", "333").await,
    ];

    h.directories.delete_directory_subtree(&ctx, top.id).await.unwrap();

    assert_eq!(h.storage.delete_many_calls(), 1);
    assert_eq!(h.storage.object_count(), 0);
    for id in [top.id, mid.id, leaf.id] {
        assert_eq!(h.directories.find(id).await.unwrap_err().kind, ErrorKind::NotFound);
    }
    for file in &files {
        assert!(h.files.find(file.id).await.is_err());
    }
    assert_eq!(h.root_size(&ctx).await, 0);
}

#[tokio::test]
async fn test_empty_subtree_skips_storage_call() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;

    let empty = h.directories.create_directory(&ctx, None, Some("empty")).await.unwrap();
    h.directories.delete_directory_subtree(&ctx, empty.id).await.unwrap();

    assert_eq!(h.storage.delete_many_calls(), 0);
    assert!(h.directories.find(empty.id).await.is_err());
}

#[tokio::test]
async fn test_deepest_buildable_tree_can_be_deleted() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;

    let top = h.directories.create_directory(&ctx, None, Some("top")).await.unwrap();
    let mut parent = top.clone();
    while parent.path.len() < MAX_TREE_DEPTH {
        parent = h
            .directories
            .create_directory(&ctx, Some(parent.id), Some("nested"))
            .await
            .unwrap();
    }
    assert_eq!(parent.path.len(), MAX_TREE_DEPTH);

    let err = h
        .directories
        .create_directory(&ctx, Some(parent.id), Some("too-deep"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    upload(&h, &ctx, Some(parent.id), "bottom.txt", "bottom").await;
    h.directories.delete_directory_subtree(&ctx, top.id).await.unwrap();

    assert!(h.directories.find(top.id).await.is_err());
    assert!(h.directories.find(parent.id).await.is_err());
    assert_eq!(h.storage.object_count(), 0);
    assert_eq!(h.root_size(&ctx).await, 0);
}

#[tokio::test]
async fn test_root_directory_cannot_be_deleted() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;

    let err = h
        .directories
        .delete_directory_subtree(&ctx, ctx.actor.root_dir_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_rename_then_list_shows_sorted_names_and_breadcrumbs() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;

    let photos = h.directories.create_directory(&ctx, None, Some("photos")).await.unwrap();
    h.directories.create_directory(&ctx, None, Some("music")).await.unwrap();
    let blank = h.directories.create_directory(&ctx, None, Some("   ")).await.unwrap();
    assert_eq!(blank.name, "New Folder");

    let renamed = h
        .directories
        .rename_directory(&ctx, photos.id, Some("<b>Archive</b>"))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Archive");

    let file = upload(&h, &ctx, None, "zeta.txt", "z").await;
    upload(&h, &ctx, None, "beta.txt", "b").await;
    h.files.rename_file(&ctx, file.id, "alpha.md").await.unwrap();

    let listing = h.directories.list_children(&ctx, None).await.unwrap();
    let dir_names: Vec<_> = listing.directories.iter().map(|d| d.directory.name.as_str()).collect();
    assert_eq!(dir_names, vec!["Archive", "New Folder", "music"]);

    let file_names: Vec<_> = listing.files.iter().map(|f| f.file.name.as_str()).collect();
    assert_eq!(file_names, vec!["alpha.md", "beta.txt"]);

    // Renaming keeps the original extension and storage key.
    let renamed_file = &listing.files[0].file;
    assert_eq!(renamed_file.extension, ".txt");
    assert_eq!(renamed_file.storage_key(), file.storage_key());

    assert_eq!(listing.breadcrumbs.len(), 1);
    assert_eq!(listing.breadcrumbs[0].name, "root-alice@example.com");
    let archive = listing
        .directories
        .iter()
        .find(|d| d.directory.id == photos.id)
        .unwrap();
    let trail: Vec<_> = archive.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(trail, vec!["root-alice@example.com", "Archive"]);
}

#[tokio::test]
async fn test_blank_file_rename_is_rejected() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;
    let file = upload(&h, &ctx, None, "a.txt", "a").await;

    let err = h.files.rename_file(&ctx, file.id, " \u{0007} ").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(h.files.find(file.id).await.unwrap().name, "a.txt");
}

#[tokio::test]
async fn test_local_download_streams_bytes() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("alice@example.com").await;
    let file = upload(&h, &ctx, None, "a.txt", "payload").await;

    let (found, target) = h.files.read_file(&ctx, file.id, Disposition::Inline).await.unwrap();
    assert_eq!(found.id, file.id);
    match target {
        DownloadTarget::Stream { size, .. } => assert_eq!(size, 7),
        other => panic!("expected a stream, got {other:?}"),
    }
}

#[tokio::test]
async fn test_access_rules_across_users() {
    let h = Harness::new(BackendKind::Local);
    let owner = h.register("owner@example.com").await;
    let alice = h.register("alice@example.com").await;
    let bob = h.register("bob@example.com").await;
    assert_eq!(owner.role(), UserRole::Owner);
    assert_eq!(alice.role(), UserRole::User);

    let file = upload(&h, &alice, None, "secret.txt", "s").await;

    // Plain users see nothing of each other.
    let err = h
        .directories
        .list_children(&bob, Some(alice.actor.root_dir_id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
    assert!(h.files.read_file(&bob, file.id, Disposition::Inline).await.is_err());
    assert!(h.files.delete_file(&bob, file.id).await.is_err());
    assert!(h.storage.contains(&file.storage_key()));

    // The owner role may read and delete anything.
    h.directories
        .list_children(&owner, Some(alice.actor.root_dir_id))
        .await
        .unwrap();
    h.files.delete_file(&owner, file.id).await.unwrap();
    assert_eq!(h.root_size(&alice).await, 0);
}

#[tokio::test]
async fn test_registration_and_usage() {
    let h = Harness::new(BackendKind::Local);
    let ctx = h.register("Alice@Example.com").await;

    let root = h.directory(ctx.actor.root_dir_id).await;
    assert_eq!(root.name, "root-alice@example.com");
    assert_eq!(root.path, vec![root.id]);
    assert_eq!(ctx.actor.quota_bytes(), common::GIB);

    upload(&h, &ctx, None, "a.txt", "abcd").await;
    let usage = h.accounts.usage(&ctx).await.unwrap();
    assert_eq!(usage.used_storage_in_bytes, 4);
    assert_eq!(usage.available_bytes, common::GIB - 4);

    let err = h
        .accounts
        .register(cloudbox_service::account::Registration {
            name: "again".to_string(),
            email: "alice@example.com".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn test_hard_delete_user_removes_rows_and_objects() {
    let h = Harness::new(BackendKind::Local);
    let owner = h.register("owner@example.com").await;
    let alice = h.register("alice@example.com").await;

    let dir = h.directories.create_directory(&alice, None, Some("x")).await.unwrap();
    upload(&h, &alice, Some(dir.id), "1.txt", "1").await;
    upload(&h, &alice, None, "2.txt", "2").await;

    // Nobody removes themselves, and a plain user cannot remove the owner.
    assert!(h.accounts.hard_delete_user(&owner, owner.user_id()).await.is_err());
    assert!(h.accounts.hard_delete_user(&alice, owner.user_id()).await.is_err());

    h.accounts.hard_delete_user(&owner, alice.user_id()).await.unwrap();

    assert_eq!(h.storage.object_count(), 0);
    assert_eq!(h.storage.delete_many_calls(), 1);
    assert_eq!(
        h.accounts.find(alice.user_id()).await.unwrap_err().kind,
        ErrorKind::NotFound
    );
    assert!(h.directories.find(alice.actor.root_dir_id).await.is_err());
}
