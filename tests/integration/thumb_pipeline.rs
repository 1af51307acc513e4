//! Thumbnail loading through the worker pool and cache.

use crate::common::{drain_until, png_bytes, store_file, write_file, CountingStore, BLOCK};
use cabinet::buffer::chunk_sizes;
use cabinet::error::ThumbError;
use cabinet::runner::TaskRunner;
use cabinet::store::memory::MemoryStore;
use cabinet::store::ResourceStore;
use cabinet::thumbs::{BatchItem, ThumbnailService};
use image::GenericImageView;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn service(store: Arc<dyn ResourceStore>) -> (Arc<ThumbnailService>, Arc<TaskRunner>) {
    let runner = Arc::new(TaskRunner::new(2));
    let service = Arc::new(ThumbnailService::new(
        store,
        runner.clone(),
        16 * 1024 * 1024,
        1.0,
    ));
    (service, runner)
}

#[test]
fn async_load_fills_cache_and_fires_completion() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "pic.png", &png_bytes(300, 100, [200, 10, 10, 255]));
    let identity = format!("image://{}?bound=64", path.display());

    let (service, runner) = service(Arc::new(MemoryStore::new()));
    let result = Arc::new(Mutex::new(None));
    let r = result.clone();
    let id = identity.clone();
    service.load_image(
        identity.clone(),
        serde_json::json!({"row": 3}),
        Some(Box::new(move |outcome, got_identity, user_data| {
            assert_eq!(got_identity, id);
            assert_eq!(user_data["row"], 3);
            *r.lock() = Some(outcome);
        })),
    );
    drain_until(&runner, || result.lock().is_some());

    assert!(result.lock().take().unwrap().is_ok());
    assert!(service.has_image(&identity));

    let image = service.request_image(&identity).unwrap();
    assert_eq!(image.dimensions(), (64, 21));
}

#[test]
fn cached_identity_completes_without_worker_round_trip() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "pic.png", &png_bytes(8, 8, [1, 2, 3, 255]));
    let identity = format!("image://{}?bound=0", path.display());

    let (service, runner) = service(Arc::new(MemoryStore::new()));
    let first = Arc::new(Mutex::new(None));
    let f = first.clone();
    service.load_image(
        identity.clone(),
        serde_json::Value::Null,
        Some(Box::new(move |outcome, _, _| *f.lock() = Some(outcome))),
    );
    drain_until(&runner, || first.lock().is_some());

    // hit path: the completion runs synchronously on this thread
    let hit = Arc::new(Mutex::new(None));
    let h = hit.clone();
    service.load_image(
        identity,
        serde_json::Value::Null,
        Some(Box::new(move |outcome, _, _| *h.lock() = Some(outcome))),
    );
    assert!(hit.lock().take().unwrap().is_ok());
}

#[test]
fn store_blob_is_read_once_per_cache_fill() {
    let store = Arc::new(CountingStore::new());
    let bytes = png_bytes(40, 40, [0, 0, 250, 255]);
    let node = store_file(store.as_ref(), 0, "pic.png", &bytes);
    let identity = format!(
        "image://store?blobId={}&source=2&bound=32",
        node.blob.unwrap()
    );

    let (service, _runner) = service(store.clone());
    service.request_image(&identity).unwrap();
    let expected_reads = chunk_sizes(bytes.len() as u64, BLOCK).count();
    assert_eq!(store.reads(), expected_reads);

    service.request_image(&identity).unwrap();
    assert_eq!(store.reads(), expected_reads, "second request must hit the cache");
}

#[test]
fn single_use_async_entry_is_consumed_on_read() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "pic.png", &png_bytes(16, 16, [9, 9, 9, 255]));
    let identity = format!("image://{}?bound=8&async=1&keep=0", path.display());

    let (service, runner) = service(Arc::new(MemoryStore::new()));
    let loaded = Arc::new(Mutex::new(None));
    let l = loaded.clone();
    service.load_image(
        identity.clone(),
        serde_json::Value::Null,
        Some(Box::new(move |outcome, _, _| *l.lock() = Some(outcome))),
    );
    drain_until(&runner, || loaded.lock().is_some());
    assert!(service.has_image(&identity));

    service.request_image(&identity).unwrap();
    assert!(!service.has_image(&identity), "consuming read must evict");
}

#[test]
fn batch_fires_per_item_completions_then_one_batch_done() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.png", &png_bytes(4, 4, [1, 0, 0, 255]));
    let b = write_file(dir.path(), "b.png", &png_bytes(4, 4, [0, 1, 0, 255]));

    let (service, runner) = service(Arc::new(MemoryStore::new()));
    let item_ok = Arc::new(AtomicUsize::new(0));
    let batch_done = Arc::new(AtomicUsize::new(0));

    let items = [&a, &b]
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            let counter = item_ok.clone();
            BatchItem {
                identity: format!("image://{}?bound=2", path.display()),
                user_data: serde_json::json!(i),
                on_done: Some(Box::new(move |outcome, _, _| {
                    assert!(outcome.is_ok());
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            }
        })
        .collect();

    let done = batch_done.clone();
    service.load_batch(
        items,
        Some(Box::new(move || {
            done.fetch_add(1, Ordering::SeqCst);
        })),
    );
    drain_until(&runner, || batch_done.load(Ordering::SeqCst) == 1);

    assert_eq!(item_ok.load(Ordering::SeqCst), 2);
    assert_eq!(batch_done.load(Ordering::SeqCst), 1);
}

#[test]
fn decode_failure_reports_error_and_caches_nothing() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "broken.png", b"not an image at all");
    let identity = format!("image://{}?bound=32", path.display());

    let (service, runner) = service(Arc::new(MemoryStore::new()));
    let result = Arc::new(Mutex::new(None));
    let r = result.clone();
    service.load_image(
        identity.clone(),
        serde_json::Value::Null,
        Some(Box::new(move |outcome, _, _| *r.lock() = Some(outcome))),
    );
    drain_until(&runner, || result.lock().is_some());

    assert!(matches!(
        result.lock().take().unwrap(),
        Err(ThumbError::Decode(_))
    ));
    assert!(!service.has_image(&identity));
}

#[test]
fn missing_file_reports_not_found() {
    let dir = tempdir().unwrap();
    let identity = format!("image://{}/ghost.png?bound=32", dir.path().display());

    let (service, _runner) = service(Arc::new(MemoryStore::new()));
    assert!(matches!(
        service.request_image(&identity),
        Err(ThumbError::NotFound(_))
    ));
}
