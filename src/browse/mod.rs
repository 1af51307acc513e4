//! Browsable collections over both backends.
//!
//! A collection presents a navigable, paginated view over the immediate
//! children of one "current directory" and exposes the mutation entry
//! points (create directory, delete, paste). Mutations run on the task
//! runner; the listing itself is owned by the control thread and is
//! regenerated by navigating again once a mutation completes.

pub mod fs;
pub mod store;

use crate::copy::CopyOutcome;
use crate::error::CopyError;
use crate::types::{NodeId, NodeKind, Origin};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Identity of a browsable item: a path on the filesystem, a node id in
/// the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ItemId {
    Path(PathBuf),
    Node(NodeId),
}

/// One UI-visible row. Regenerated on every navigation or mutation; it has
/// no identity beyond its backing entry.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: NodeKind,
    pub name: String,
    pub size: u64,
    pub origin: Origin,
}

/// Per-item result of a batch mutation, reported through the completion
/// callback instead of being swallowed.
#[derive(Debug)]
pub struct ItemOutcome {
    pub item: ItemId,
    pub outcome: Result<CopyOutcome, CopyError>,
}

/// Batch completion payload: destination-level failures short-circuit into
/// the `Err` arm, per-item results land in `Ok`.
pub type BatchResult = Result<Vec<ItemOutcome>, CopyError>;

/// Completion callback for batch mutations; `None` is valid and ignored.
pub type BatchCallback = Option<Box<dyn FnOnce(BatchResult) + Send + 'static>>;

/// Completion callback for single mutations.
pub type DoneCallback = Option<Box<dyn FnOnce(Result<(), CopyError>) + Send + 'static>>;

/// Pending/visible split of a directory listing.
///
/// `change_directory` loads the full child listing into the pending
/// sequence; `reveal_more` moves items into the visible sequence a page at
/// a time so a large directory never floods a single UI frame. Order is
/// fixed when the listing is loaded and preserved across reveals.
#[derive(Debug, Default)]
pub struct Listing {
    pending: VecDeque<Item>,
    visible: Vec<Item>,
}

impl Listing {
    pub fn reset(&mut self, items: Vec<Item>) {
        self.pending = items.into();
        self.visible.clear();
    }

    /// Move up to `count` items from pending to visible, preserving order.
    /// Returns the number moved; 0 when nothing remains pending.
    pub fn reveal(&mut self, count: usize) -> usize {
        let take = count.min(self.pending.len());
        self.visible.extend(self.pending.drain(..take));
        take
    }

    pub fn visible(&self) -> &[Item] {
        &self.visible
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.visible.clear();
    }
}

/// Order a child listing directories-first, then by name, stably.
pub(crate) fn sort_items(items: &mut [Item]) {
    items.sort_by(|a, b| {
        let rank = |k: NodeKind| match k {
            NodeKind::Directory => 0u8,
            NodeKind::File => 1,
        };
        rank(a.kind)
            .cmp(&rank(b.kind))
            .then_with(|| a.name.cmp(&b.name))
    });
}
