//! Filesystem-backed browsable collection.

use super::{sort_items, BatchCallback, BatchResult, DoneCallback, Item, ItemId, ItemOutcome, Listing};
use crate::copy::{ChildFailurePolicy, CollisionPolicy, CopyOutcome, TreeCopyEngine};
use crate::error::CopyError;
use crate::runner::TaskRunner;
use crate::types::{NodeId, NodeKind, Origin};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Paginated view over one OS directory with mutation entry points.
///
/// The listing lives on the control thread; mutating operations are
/// scheduled on the runner and report back through their callbacks.
pub struct FsCollection {
    engine: Arc<TreeCopyEngine>,
    runner: Arc<TaskRunner>,
    child_policy: ChildFailurePolicy,
    page_size: usize,
    listing: Listing,
    current_dir: Option<PathBuf>,
    total_items: usize,
}

impl FsCollection {
    pub fn new(engine: Arc<TreeCopyEngine>, runner: Arc<TaskRunner>) -> Self {
        Self {
            engine,
            runner,
            child_policy: ChildFailurePolicy::FailFast,
            page_size: 32,
            listing: Listing::default(),
            current_dir: None,
            total_items: 0,
        }
    }

    pub fn with_child_policy(mut self, policy: ChildFailurePolicy) -> Self {
        self.child_policy = policy;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Navigate to `target`. Clears state, loads the full child listing
    /// into the pending sequence (directories first, then by name), and
    /// records the directory metadata.
    pub fn change_directory(&mut self, target: &Path) -> Result<(), CopyError> {
        if !target.is_dir() {
            return Err(CopyError::NotFound(target.display().to_string()));
        }
        self.clear();

        let mut items = Vec::new();
        for entry in WalkDir::new(target).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(dir = %target.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping entry without metadata");
                    continue;
                }
            };
            items.push(Item {
                id: ItemId::Path(entry.path().to_path_buf()),
                kind: if meta.is_dir() {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                },
                name: entry.file_name().to_string_lossy().into_owned(),
                size: if meta.is_dir() { 0 } else { meta.len() },
                origin: Origin::FileSystem,
            });
        }
        sort_items(&mut items);

        self.total_items = items.len();
        self.current_dir = Some(target.to_path_buf());
        self.listing.reset(items);
        debug!(dir = %target.display(), total = self.total_items, "changed directory");
        Ok(())
    }

    /// Move up to `count` pending items into the visible sequence.
    pub fn reveal_more(&mut self, count: usize) -> usize {
        self.listing.reveal(count)
    }

    /// Reveal one configured page of pending items.
    pub fn reveal_page(&mut self) -> usize {
        self.listing.reveal(self.page_size)
    }

    pub fn items(&self) -> &[Item] {
        self.listing.visible()
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Reset to the empty, no-current-directory state.
    pub fn clear(&mut self) {
        self.listing.clear();
        self.current_dir = None;
        self.total_items = 0;
    }

    /// Create a directory named `name` under `parent` on the worker pool.
    pub fn create_directory(&self, name: String, parent: PathBuf, on_done: DoneCallback) {
        self.runner.schedule(move || {
            let path = parent.join(&name);
            let result = std::fs::create_dir(&path).map_err(|e| CopyError::io(&path, e));
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "create directory failed");
            }
            on_done.map(|cb| -> Box<dyn FnOnce() + Send> { Box::new(move || cb(result)) })
        });
    }

    /// Delete files and directory trees, aggregating per-item outcomes.
    pub fn delete_items(&self, items: Vec<PathBuf>, on_done: BatchCallback) {
        self.runner.schedule(move || {
            let mut outcomes = Vec::with_capacity(items.len());
            for path in items {
                let result = delete_path(&path);
                if let Err(e) = &result {
                    warn!(path = %path.display(), error = %e, "delete failed");
                }
                outcomes.push(ItemOutcome {
                    item: ItemId::Path(path),
                    outcome: result.map(|_| CopyOutcome::Copied),
                });
            }
            finish_batch(on_done, Ok(outcomes))
        });
    }

    /// Paste filesystem items into a filesystem directory. Single files
    /// use the idempotent skip rule; directories never merge.
    pub fn paste_from_file_system(&self, items: Vec<PathBuf>, dst: PathBuf, on_done: BatchCallback) {
        let engine = Arc::clone(&self.engine);
        let child_policy = self.child_policy;
        self.runner.schedule(move || {
            if !dst.is_dir() {
                return finish_batch(on_done, Err(CopyError::NotFound(dst.display().to_string())));
            }
            let mut outcomes = Vec::with_capacity(items.len());
            for path in items {
                let outcome = if path.is_dir() {
                    engine.copy_directory(&path, &dst, CollisionPolicy::Fail, child_policy)
                } else {
                    engine.copy_file(&path, &dst, CollisionPolicy::Skip)
                };
                outcomes.push(ItemOutcome {
                    item: ItemId::Path(path),
                    outcome,
                });
            }
            finish_batch(on_done, Ok(outcomes))
        });
    }

    /// Paste local-store items out into a filesystem directory.
    pub fn paste_from_local_store(&self, items: Vec<NodeId>, dst: PathBuf, on_done: BatchCallback) {
        let engine = Arc::clone(&self.engine);
        let child_policy = self.child_policy;
        self.runner.schedule(move || {
            if !dst.is_dir() {
                return finish_batch(on_done, Err(CopyError::NotFound(dst.display().to_string())));
            }
            let mut outcomes = Vec::with_capacity(items.len());
            for id in items {
                let outcome = match node_kind(&engine, id) {
                    Ok(NodeKind::Directory) => {
                        engine.export_directory(id, &dst, CollisionPolicy::Fail, child_policy)
                    }
                    Ok(NodeKind::File) => engine.export_file(id, &dst, CollisionPolicy::Fail),
                    Err(e) => Err(e),
                };
                outcomes.push(ItemOutcome {
                    item: ItemId::Node(id),
                    outcome,
                });
            }
            finish_batch(on_done, Ok(outcomes))
        });
    }
}

pub(crate) fn node_kind(engine: &TreeCopyEngine, id: NodeId) -> Result<NodeKind, CopyError> {
    engine
        .store()
        .query_node(&crate::store::NodeFilter::by_id(id))?
        .map(|n| n.kind)
        .ok_or_else(|| CopyError::NotFound(format!("store node {}", id)))
}

pub(crate) fn finish_batch(on_done: BatchCallback, result: BatchResult) -> crate::runner::Completion {
    on_done.map(|cb| -> Box<dyn FnOnce() + Send> { Box::new(move || cb(result)) })
}

fn delete_path(path: &Path) -> Result<(), CopyError> {
    if path.is_dir() {
        std::fs::remove_dir_all(path).map_err(|e| CopyError::io(path, e))
    } else if path.is_file() {
        std::fs::remove_file(path).map_err(|e| CopyError::io(path, e))
    } else {
        Err(CopyError::NotFound(path.display().to_string()))
    }
}
