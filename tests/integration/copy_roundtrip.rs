//! End-to-end copies between the filesystem and the store.

use crate::common::{engine, payload, snapshot, store_file, write_file, BLOCK};
use cabinet::copy::{ChildFailurePolicy, CollisionPolicy, CopyOutcome};
use cabinet::error::CopyError;
use cabinet::store::memory::MemoryStore;
use cabinet::store::{read_blob_to_vec, NodeFilter, ResourceStore};
use cabinet::types::NodeKind;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn file_survives_fs_store_fs_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    let src_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();

    // spans two full blocks plus a partial tail
    let bytes = payload(BLOCK * 2 + 1808);
    let src = write_file(src_dir.path(), "data.bin", &bytes);

    engine
        .ingest_file(&src, 0, CollisionPolicy::Fail)
        .unwrap();
    let node = store
        .query_node(&NodeFilter::named_child(0, "data.bin"))
        .unwrap()
        .unwrap();
    assert_eq!(node.size, bytes.len() as u64);
    assert_eq!(
        node.content_hash,
        Some(*blake3::hash(&bytes).as_bytes())
    );
    let stored = read_blob_to_vec(store.as_ref(), node.blob.unwrap(), BLOCK).unwrap();
    assert_eq!(stored, bytes);

    engine
        .export_file(node.id, out_dir.path(), CollisionPolicy::Fail)
        .unwrap();
    let exported = std::fs::read(out_dir.path().join("data.bin")).unwrap();
    assert_eq!(exported, bytes);
}

#[test]
fn nested_tree_replicates_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    let src_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();

    let root = src_dir.path().join("album");
    std::fs::create_dir_all(root.join("inner")).unwrap();
    write_file(&root, "a.txt", b"alpha");
    write_file(&root.join("inner"), "b.txt", &payload(BLOCK + 7));

    engine
        .ingest_directory(&root, 0, CollisionPolicy::Fail, ChildFailurePolicy::FailFast)
        .unwrap();
    let album = store
        .query_node(&NodeFilter::named_child(0, "album").kind(NodeKind::Directory))
        .unwrap()
        .unwrap();
    engine
        .export_directory(
            album.id,
            out_dir.path(),
            CollisionPolicy::Fail,
            ChildFailurePolicy::FailFast,
        )
        .unwrap();

    assert_eq!(snapshot(out_dir.path()), snapshot(src_dir.path()));
    let b = std::fs::read(out_dir.path().join("album/inner/b.txt")).unwrap();
    assert_eq!(b, payload(BLOCK + 7));
}

#[test]
fn fs_copy_skip_is_idempotent_and_preserves_destination() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store);
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();

    let src = write_file(src_dir.path(), "f.bin", b"new content");
    write_file(dst_dir.path(), "f.bin", b"old");

    let outcome = engine
        .copy_file(&src, dst_dir.path(), CollisionPolicy::Skip)
        .unwrap();
    assert_eq!(outcome, CopyOutcome::Skipped);
    assert_eq!(std::fs::read(dst_dir.path().join("f.bin")).unwrap(), b"old");
}

#[test]
fn fs_overwrite_onto_own_location_is_rejected_and_source_survives() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store);
    let dir = tempdir().unwrap();
    let src = write_file(dir.path(), "f.bin", b"irreplaceable");

    let err = engine
        .copy_file(&src, dir.path(), CollisionPolicy::Overwrite)
        .unwrap_err();
    assert!(matches!(err, CopyError::SelfReference));
    assert_eq!(std::fs::read(&src).unwrap(), b"irreplaceable");

    let tree = dir.path().join("docs");
    std::fs::create_dir(&tree).unwrap();
    write_file(&tree, "inner.txt", b"kept");
    let err = engine
        .copy_directory(
            &tree,
            dir.path(),
            CollisionPolicy::Overwrite,
            ChildFailurePolicy::FailFast,
        )
        .unwrap_err();
    assert!(matches!(err, CopyError::SelfReference));
    assert_eq!(std::fs::read(tree.join("inner.txt")).unwrap(), b"kept");
}

#[test]
fn fs_directory_collision_aborts_without_touching_destination() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store);
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();

    let src = src_dir.path().join("docs");
    std::fs::create_dir(&src).unwrap();
    write_file(&src, "new.txt", b"new");

    let existing = dst_dir.path().join("docs");
    std::fs::create_dir(&existing).unwrap();
    write_file(&existing, "kept.txt", b"kept");
    let before = snapshot(dst_dir.path());

    let err = engine
        .copy_directory(
            &src,
            dst_dir.path(),
            CollisionPolicy::Fail,
            ChildFailurePolicy::FailFast,
        )
        .unwrap_err();
    assert!(matches!(err, CopyError::Collision(_)));
    assert_eq!(snapshot(dst_dir.path()), before);
}

#[test]
fn store_directory_collision_aborts_without_touching_destination() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    let src_dir = tempdir().unwrap();

    let src = src_dir.path().join("docs");
    std::fs::create_dir(&src).unwrap();
    write_file(&src, "new.txt", b"new");

    let existing = store
        .insert_node(NodeKind::Directory, "docs", 0, Default::default())
        .unwrap();
    store_file(store.as_ref(), existing, "kept.txt", b"kept");
    let nodes_before = store.node_count();

    let err = engine
        .ingest_directory(&src, 0, CollisionPolicy::Fail, ChildFailurePolicy::FailFast)
        .unwrap_err();
    assert!(matches!(err, CopyError::Collision(_)));
    assert_eq!(store.node_count(), nodes_before);
    assert!(store
        .query_node(&NodeFilter::named_child(existing, "kept.txt"))
        .unwrap()
        .is_some());
}

#[test]
fn continue_policy_exports_remaining_children_and_reports_first_error() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    let out_dir = tempdir().unwrap();

    let dir = store
        .insert_node(NodeKind::Directory, "mixed", 0, Default::default())
        .unwrap();
    // "bad.bin" sorts before "good.txt"; its blob id points nowhere
    store
        .insert_node(
            NodeKind::File,
            "bad.bin",
            dir,
            cabinet::store::NodeExtra {
                size: 4,
                content_hash: None,
                blob: Some(9999),
            },
        )
        .unwrap();
    store_file(store.as_ref(), dir, "good.txt", b"good");

    let err = engine
        .export_directory(
            dir,
            out_dir.path(),
            CollisionPolicy::Fail,
            ChildFailurePolicy::Continue,
        )
        .unwrap_err();
    assert!(matches!(err, CopyError::Store(_)));
    let good = std::fs::read(out_dir.path().join("mixed/good.txt")).unwrap();
    assert_eq!(good, b"good");
}

#[test]
fn fail_fast_stops_at_the_first_broken_child() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    let out_dir = tempdir().unwrap();

    let dir = store
        .insert_node(NodeKind::Directory, "mixed", 0, Default::default())
        .unwrap();
    store
        .insert_node(
            NodeKind::File,
            "bad.bin",
            dir,
            cabinet::store::NodeExtra {
                size: 4,
                content_hash: None,
                blob: Some(9999),
            },
        )
        .unwrap();
    store_file(store.as_ref(), dir, "good.txt", b"good");

    let err = engine
        .export_directory(
            dir,
            out_dir.path(),
            CollisionPolicy::Fail,
            ChildFailurePolicy::FailFast,
        )
        .unwrap_err();
    assert!(matches!(err, CopyError::Store(_)));
    assert!(!out_dir.path().join("mixed/good.txt").exists());
}
