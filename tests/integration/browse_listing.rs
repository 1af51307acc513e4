//! Navigation and pagination over both collection backends.

use crate::common::{engine, store_file, write_file};
use cabinet::browse::fs::FsCollection;
use cabinet::browse::store::StoreCollection;
use cabinet::browse::ItemId;
use cabinet::error::CopyError;
use cabinet::runner::TaskRunner;
use cabinet::store::memory::MemoryStore;
use cabinet::store::ResourceStore;
use cabinet::types::{NodeKind, Origin};
use std::sync::Arc;
use tempfile::tempdir;

fn fs_collection() -> FsCollection {
    let store = Arc::new(MemoryStore::new());
    FsCollection::new(engine(store), Arc::new(TaskRunner::new(1)))
}

fn store_collection(store: Arc<MemoryStore>) -> StoreCollection {
    StoreCollection::new(engine(store), Arc::new(TaskRunner::new(1)))
}

#[test]
fn fs_listing_orders_directories_first_then_names() {
    let dir = tempdir().unwrap();
    std::fs::create_dir(dir.path().join("zoo")).unwrap();
    std::fs::create_dir(dir.path().join("attic")).unwrap();
    write_file(dir.path(), "banana.txt", b"b");
    write_file(dir.path(), "apple.txt", b"aa");

    let mut col = fs_collection();
    col.change_directory(dir.path()).unwrap();
    assert_eq!(col.total_items(), 4);
    assert_eq!(col.current_dir(), Some(dir.path()));

    col.reveal_more(4);
    let names: Vec<&str> = col.items().iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["attic", "zoo", "apple.txt", "banana.txt"]);
    assert_eq!(col.items()[0].kind, NodeKind::Directory);
    assert_eq!(col.items()[3].size, 1);
    assert!(col.items().iter().all(|i| i.origin == Origin::FileSystem));
}

#[test]
fn fs_reveal_pages_until_pending_is_empty() {
    let dir = tempdir().unwrap();
    for i in 0..7 {
        write_file(dir.path(), &format!("f{}.txt", i), b"x");
    }

    let mut col = fs_collection();
    col.change_directory(dir.path()).unwrap();

    assert_eq!(col.reveal_more(3), 3);
    assert_eq!(col.items().len(), 3);
    assert_eq!(col.reveal_more(3), 3);
    assert_eq!(col.reveal_more(3), 1);
    assert_eq!(col.reveal_more(3), 0);
    assert_eq!(col.items().len(), 7);
}

#[test]
fn fs_reveal_page_uses_configured_size() {
    let dir = tempdir().unwrap();
    for i in 0..5 {
        write_file(dir.path(), &format!("f{}.txt", i), b"x");
    }

    let store = Arc::new(MemoryStore::new());
    let mut col = FsCollection::new(engine(store), Arc::new(TaskRunner::new(1)))
        .with_page_size(2);
    col.change_directory(dir.path()).unwrap();

    assert_eq!(col.reveal_page(), 2);
    assert_eq!(col.reveal_page(), 2);
    assert_eq!(col.reveal_page(), 1);
    assert_eq!(col.reveal_page(), 0);
}

#[test]
fn fs_change_directory_rejects_missing_target() {
    let dir = tempdir().unwrap();
    let mut col = fs_collection();
    let err = col.change_directory(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, CopyError::NotFound(_)));
    assert!(col.current_dir().is_none());
}

#[test]
fn fs_clear_resets_listing_and_location() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "f.txt", b"x");

    let mut col = fs_collection();
    col.change_directory(dir.path()).unwrap();
    col.reveal_more(1);
    col.clear();

    assert!(col.items().is_empty());
    assert!(col.current_dir().is_none());
    assert_eq!(col.total_items(), 0);
}

#[test]
fn store_listing_orders_and_exposes_node_ids() {
    let store = Arc::new(MemoryStore::new());
    let dir = store
        .insert_node(NodeKind::Directory, "box", 0, Default::default())
        .unwrap();
    let sub = store
        .insert_node(NodeKind::Directory, "sub", dir, Default::default())
        .unwrap();
    let file = store_file(store.as_ref(), dir, "a.bin", b"abcd");

    let mut col = store_collection(store);
    col.change_directory(dir).unwrap();
    assert_eq!(col.total_items(), 2);
    assert_eq!(col.current_dir(), Some(dir));

    col.reveal_more(10);
    assert_eq!(col.items()[0].id, ItemId::Node(sub));
    assert_eq!(col.items()[1].id, ItemId::Node(file.id));
    assert_eq!(col.items()[1].size, 4);
    assert!(col.items().iter().all(|i| i.origin == Origin::LocalStore));
}

#[test]
fn store_renavigation_replaces_the_listing() {
    let store = Arc::new(MemoryStore::new());
    let a = store
        .insert_node(NodeKind::Directory, "a", 0, Default::default())
        .unwrap();
    let b = store
        .insert_node(NodeKind::Directory, "b", 0, Default::default())
        .unwrap();
    store_file(store.as_ref(), a, "only.txt", b"1");
    store_file(store.as_ref(), b, "one.txt", b"1");
    store_file(store.as_ref(), b, "two.txt", b"2");

    let mut col = store_collection(store);
    col.change_directory(a).unwrap();
    col.reveal_more(10);
    assert_eq!(col.items().len(), 1);

    col.change_directory(b).unwrap();
    assert_eq!(col.current_dir(), Some(b));
    assert_eq!(col.total_items(), 2);
    assert!(col.items().is_empty(), "old listing must not leak through");
    col.reveal_more(10);
    assert_eq!(col.items().len(), 2);
}

#[test]
fn store_root_is_always_navigable() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_node(NodeKind::File, "top.txt", 0, Default::default())
        .unwrap();

    let mut col = store_collection(store);
    col.change_directory(0).unwrap();
    assert_eq!(col.total_items(), 1);
}

#[test]
fn store_change_directory_rejects_missing_or_file_node() {
    let store = Arc::new(MemoryStore::new());
    let file = store
        .insert_node(NodeKind::File, "f", 0, Default::default())
        .unwrap();

    let mut col = store_collection(store);
    assert!(matches!(
        col.change_directory(999),
        Err(CopyError::NotFound(_))
    ));
    assert!(matches!(
        col.change_directory(file),
        Err(CopyError::NotFound(_))
    ));
    assert!(col.current_dir().is_none());
}
