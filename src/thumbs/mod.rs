//! Asynchronous thumbnail acquisition and caching.
//!
//! [`ThumbnailService`] resolves an image identity to decoded pixel data:
//! raw bytes come from the filesystem or a store blob, the image is
//! decoded, orientation-corrected from its EXIF metadata, downsampled to
//! the requested bound, and cached. The UI pulls synchronously through
//! [`ThumbnailService::request_image`] or prefetches through the
//! event-driven [`ThumbnailService::load_image`] / `load_batch` path; both
//! modes share one cache key space and fill policy.

pub mod orient;
pub mod request;

use crate::error::ThumbError;
use crate::runner::TaskRunner;
use crate::store::{read_blob_to_vec, ResourceStore};
use crate::types::Origin;
use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;
use request::ThumbRequest;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Completion callback for a single load: error outcome, the request
/// identity, and the caller's opaque data. `None` is valid and ignored.
pub type LoadCallback =
    Option<Box<dyn FnOnce(Result<(), ThumbError>, String, serde_json::Value) + Send + 'static>>;

/// Completion callback fired once after the last item of a batch.
pub type BatchDoneCallback = Option<Box<dyn FnOnce() + Send + 'static>>;

/// One entry of a batch load.
pub struct BatchItem {
    pub identity: String,
    pub user_data: serde_json::Value,
    pub on_done: LoadCallback,
}

struct CacheEntry {
    image: DynamicImage,
    bytes: u64,
    last_used: u64,
}

/// Identity-keyed image cache, LRU-evicted to a byte budget.
struct ThumbCache {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
    budget: u64,
    tick: u64,
}

impl ThumbCache {
    fn new(budget: u64) -> Self {
        Self {
            entries: HashMap::new(),
            total_bytes: 0,
            budget,
            tick: 0,
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&mut self, key: &str) -> Option<DynamicImage> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = tick;
            entry.image.clone()
        })
    }

    fn take(&mut self, key: &str) -> Option<DynamicImage> {
        self.entries.remove(key).map(|entry| {
            self.total_bytes -= entry.bytes;
            entry.image
        })
    }

    fn insert(&mut self, key: String, image: DynamicImage) {
        let bytes = approx_bytes(&image);
        if let Some(old) = self.entries.remove(&key) {
            self.total_bytes -= old.bytes;
        }
        // make room; the freshly inserted entry itself is never evicted
        while self.total_bytes + bytes > self.budget && !self.entries.is_empty() {
            if let Some(lru) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                if let Some(evicted) = self.entries.remove(&lru) {
                    self.total_bytes -= evicted.bytes;
                    debug!(key = %lru, bytes = evicted.bytes, "evicted thumbnail");
                }
            }
        }
        self.tick += 1;
        self.total_bytes += bytes;
        self.entries.insert(
            key,
            CacheEntry {
                image,
                bytes,
                last_used: self.tick,
            },
        );
    }
}

fn approx_bytes(image: &DynamicImage) -> u64 {
    let (w, h) = image.dimensions();
    w as u64 * h as u64 * 4
}

/// Thumbnail pipeline and cache. Shared via `Arc`; the cache mutex is the
/// only lock on the load path.
pub struct ThumbnailService {
    store: Arc<dyn ResourceStore>,
    runner: Arc<TaskRunner>,
    cache: Mutex<ThumbCache>,
    block_size: usize,
    density: f32,
}

impl ThumbnailService {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        runner: Arc<TaskRunner>,
        cache_budget_bytes: u64,
        density: f32,
    ) -> Self {
        Self {
            store,
            runner,
            cache: Mutex::new(ThumbCache::new(cache_budget_bytes)),
            block_size: crate::buffer::DEFAULT_BLOCK_SIZE,
            density,
        }
    }

    pub fn from_config(
        store: Arc<dyn ResourceStore>,
        runner: Arc<TaskRunner>,
        config: &crate::config::EngineConfig,
    ) -> Self {
        Self {
            store,
            runner,
            cache: Mutex::new(ThumbCache::new(config.thumb_cache_bytes)),
            block_size: config.block_size,
            density: config.density,
        }
    }

    /// Whether an identity is currently cached.
    pub fn has_image(&self, identity: &str) -> bool {
        self.cache.lock().contains(identity)
    }

    /// Asynchronously resolve one identity. A cache hit fires the
    /// completion immediately on the calling thread; a miss schedules the
    /// pipeline on the worker pool and delivers the completion through the
    /// runner's control-thread channel.
    pub fn load_image(
        self: &Arc<Self>,
        identity: String,
        user_data: serde_json::Value,
        on_done: LoadCallback,
    ) {
        if self.has_image(&identity) {
            if let Some(cb) = on_done {
                cb(Ok(()), identity, user_data);
            }
            return;
        }

        let service = Arc::clone(self);
        self.runner.schedule(move || {
            let result = service.load_into_cache(&identity);
            on_done.map(|cb| -> Box<dyn FnOnce() + Send> {
                Box::new(move || cb(result, identity, user_data))
            })
        });
    }

    /// Resolve a batch of identities sequentially on one worker task.
    /// Per-item completions are delivered as each item finishes; the batch
    /// completion fires once after the last item, independent of per-item
    /// outcomes.
    pub fn load_batch(self: &Arc<Self>, items: Vec<BatchItem>, on_batch_done: BatchDoneCallback) {
        let service = Arc::clone(self);
        let tx = self.runner.completion_sender();
        self.runner.schedule(move || {
            for item in items {
                let result = if service.has_image(&item.identity) {
                    Ok(())
                } else {
                    service.load_into_cache(&item.identity)
                };
                if let Some(cb) = item.on_done {
                    let identity = item.identity;
                    let user_data = item.user_data;
                    let _ = tx.send(Box::new(move || cb(result, identity, user_data)));
                }
            }
            on_batch_done.map(|cb| -> Box<dyn FnOnce() + Send> { Box::new(cb) })
        });
    }

    /// Synchronous provider accessor. A cached entry is returned directly
    /// (and consumed when the identity marks itself single-use async); on
    /// a miss the pipeline runs inline and fills the cache under the same
    /// key, so a later async request for the identity hits.
    pub fn request_image(&self, identity: &str) -> Result<DynamicImage, ThumbError> {
        let request = ThumbRequest::parse(identity)?;

        {
            let mut cache = self.cache.lock();
            let hit = if request.asynchronous && !request.keep {
                cache.take(identity)
            } else {
                cache.get(identity)
            };
            if let Some(image) = hit {
                return Ok(image);
            }
        }

        let image = self.run_pipeline(&request)?;
        self.cache.lock().insert(identity.to_string(), image.clone());
        Ok(image)
    }

    /// Run the pipeline for an identity and cache the result. No cache
    /// entry is produced on failure.
    fn load_into_cache(&self, identity: &str) -> Result<(), ThumbError> {
        let request = ThumbRequest::parse(identity)?;
        match self.run_pipeline(&request) {
            Ok(image) => {
                self.cache.lock().insert(identity.to_string(), image);
                Ok(())
            }
            Err(e) => {
                warn!(identity, error = %e, "thumbnail load failed");
                Err(e)
            }
        }
    }

    /// Load raw bytes, decode, orient, and scale.
    fn run_pipeline(&self, request: &ThumbRequest) -> Result<DynamicImage, ThumbError> {
        let data = match request.source {
            Origin::FileSystem => std::fs::read(&request.path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ThumbError::NotFound(request.path.display().to_string())
                } else {
                    ThumbError::Io(e)
                }
            })?,
            Origin::LocalStore => {
                read_blob_to_vec(self.store.as_ref(), request.blob_id, self.block_size)?
            }
        };

        let decoded = image::load_from_memory(&data)?;
        let oriented = orient::orientation_from_bytes(&data).correct(decoded);
        Ok(self.scale_to_bound(oriented, request.bound))
    }

    /// Proportionally downscale so the longer dimension equals the
    /// density-adjusted bound; smaller images keep their dimensions.
    fn scale_to_bound(&self, image: DynamicImage, bound: u32) -> DynamicImage {
        if bound == 0 {
            return image;
        }
        let effective = ((bound as f32) * self.density).round().max(1.0) as u32;
        let (w, h) = image.dimensions();
        if w <= effective && h <= effective {
            return image;
        }
        image.thumbnail(effective, effective)
    }
}
