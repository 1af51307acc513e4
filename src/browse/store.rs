//! Local-store-backed browsable collection.

use super::fs::{finish_batch, node_kind};
use super::{sort_items, BatchCallback, DoneCallback, Item, ItemId, ItemOutcome, Listing};
use crate::copy::{ChildFailurePolicy, CollisionPolicy, TreeCopyEngine};
use crate::error::CopyError;
use crate::runner::TaskRunner;
use crate::store::{NodeExtra, NodeFilter};
use crate::types::{NodeId, NodeKind, Origin};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Paginated view over one local-store directory node with mutation entry
/// points. Node id 0 is the root container.
pub struct StoreCollection {
    engine: Arc<TreeCopyEngine>,
    runner: Arc<TaskRunner>,
    child_policy: ChildFailurePolicy,
    page_size: usize,
    listing: Listing,
    current_dir: Option<NodeId>,
    total_items: usize,
}

impl StoreCollection {
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

    /// Navigate to the directory node `target` (0 for the root).
    pub fn change_directory(&mut self, target: NodeId) -> Result<(), CopyError> {
        let store = Arc::clone(self.engine.store());
        if target != 0
            && store
                .count_matching(&NodeFilter::by_id(target).kind(NodeKind::Directory))?
                == 0
        {
            return Err(CopyError::NotFound(format!("store node {}", target)));
        }
        self.clear();

        let mut items: Vec<Item> = store
            .query_children(target)?
            .into_iter()
            .map(|node| Item {
                id: ItemId::Node(node.id),
                kind: node.kind,
                name: node.name,
                size: node.size,
                origin: Origin::LocalStore,
            })
            .collect();
        sort_items(&mut items);

        self.total_items = items.len();
        self.current_dir = Some(target);
        self.listing.reset(items);
        debug!(node = target, total = self.total_items, "changed store directory");
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

    pub fn current_dir(&self) -> Option<NodeId> {
        self.current_dir
    }

    /// Reset to the empty, no-current-directory state.
    pub fn clear(&mut self) {
        self.listing.clear();
        self.current_dir = None;
        self.total_items = 0;
    }

    /// Create a directory node named `name` under `parent` on the worker
    /// pool. Duplicate names within the parent are rejected.
    pub fn create_directory(&self, name: String, parent: NodeId, on_done: DoneCallback) {
        let engine = Arc::clone(&self.engine);
        self.runner.schedule(move || {
            let result = create_directory_node(&engine, &name, parent);
            if let Err(e) = &result {
                warn!(name = %name, parent, error = %e, "create directory node failed");
            }
            on_done.map(|cb| -> Box<dyn FnOnce() + Send> { Box::new(move || cb(result)) })
        });
    }

    /// Delete store subtrees, aggregating per-item outcomes.
    pub fn delete_items(&self, items: Vec<NodeId>, on_done: BatchCallback) {
        let engine = Arc::clone(&self.engine);
        self.runner.schedule(move || {
            let mut outcomes = Vec::with_capacity(items.len());
            for id in items {
                let result = engine.delete_tree(id);
                if let Err(e) = &result {
                    warn!(node = id, error = %e, "delete failed");
                }
                outcomes.push(ItemOutcome {
                    item: ItemId::Node(id),
                    outcome: result.map(|_| crate::copy::CopyOutcome::Copied),
                });
            }
            finish_batch(on_done, Ok(outcomes))
        });
    }

    /// Paste filesystem items into a store directory node.
    pub fn paste_from_file_system(&self, items: Vec<PathBuf>, dst: NodeId, on_done: BatchCallback) {
        let engine = Arc::clone(&self.engine);
        let child_policy = self.child_policy;
        self.runner.schedule(move || {
            if let Err(e) = require_directory_node(&engine, dst) {
                return finish_batch(on_done, Err(e));
            }
            let mut outcomes = Vec::with_capacity(items.len());
            for path in items {
                let outcome = if path.is_dir() {
                    engine.ingest_directory(&path, dst, CollisionPolicy::Fail, child_policy)
                } else {
                    engine.ingest_file(&path, dst, CollisionPolicy::Fail)
                };
                outcomes.push(ItemOutcome {
                    item: ItemId::Path(path),
                    outcome,
                });
            }
            finish_batch(on_done, Ok(outcomes))
        });
    }

    /// Paste store items under another store directory node.
    pub fn paste_from_local_store(&self, items: Vec<NodeId>, dst: NodeId, on_done: BatchCallback) {
        let engine = Arc::clone(&self.engine);
        let child_policy = self.child_policy;
        self.runner.schedule(move || {
            if let Err(e) = require_directory_node(&engine, dst) {
                return finish_batch(on_done, Err(e));
            }
            let mut outcomes = Vec::with_capacity(items.len());
            for id in items {
                let outcome = match node_kind(&engine, id) {
                    Ok(NodeKind::Directory) => {
                        engine.copy_node_tree(id, dst, CollisionPolicy::Fail, child_policy)
                    }
                    Ok(NodeKind::File) => engine.copy_node(id, dst, CollisionPolicy::Fail),
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

fn create_directory_node(
    engine: &TreeCopyEngine,
    name: &str,
    parent: NodeId,
) -> Result<(), CopyError> {
    let store = engine.store();
    if store
        .count_matching(&NodeFilter::named_child(parent, name).kind(NodeKind::Directory))?
        > 0
    {
        return Err(CopyError::Collision(name.to_string()));
    }
    store.insert_node(NodeKind::Directory, name, parent, NodeExtra::default())?;
    Ok(())
}

fn require_directory_node(engine: &TreeCopyEngine, id: NodeId) -> Result<(), CopyError> {
    if id == 0 {
        return Ok(());
    }
    if engine
        .store()
        .count_matching(&NodeFilter::by_id(id).kind(NodeKind::Directory))?
        == 0
    {
        return Err(CopyError::NotFound(format!("store node {}", id)));
    }
    Ok(())
}
