//! Local store interface.
//!
//! The encrypted store itself lives outside this crate; the engine only
//! consumes it through [`ResourceStore`]. Nodes form a hierarchical
//! namespace rooted at id 0, file nodes own at most one blob, and blob
//! content moves exclusively through bounded chunked transfers.

pub mod memory;

use crate::buffer::BlockBuffer;
use crate::error::StoreError;
use crate::types::{BlobId, ContentHash, NodeId, NodeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named entry in the local store's hierarchical namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfsNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    /// Parent node id; 0 is the root container.
    pub parent: NodeId,
    pub size: u64,
    pub content_hash: Option<ContentHash>,
    /// Owning blob reference; exactly one node references a blob.
    pub blob: Option<BlobId>,
    pub created_at: DateTime<Utc>,
}

/// Match criteria for node queries. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub id: Option<NodeId>,
    pub parent: Option<NodeId>,
    pub kind: Option<NodeKind>,
    pub name: Option<String>,
}

impl NodeFilter {
    pub fn by_id(id: NodeId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn children_of(parent: NodeId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn named_child(parent: NodeId, name: &str) -> Self {
        Self {
            parent: Some(parent),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub(crate) fn matches(&self, node: &VfsNode) -> bool {
        self.id.map_or(true, |id| node.id == id)
            && self.parent.map_or(true, |p| node.parent == p)
            && self.kind.map_or(true, |k| node.kind == k)
            && self.name.as_deref().map_or(true, |n| node.name == n)
    }
}

/// Metadata attached when inserting a file node.
#[derive(Debug, Clone, Default)]
pub struct NodeExtra {
    pub size: u64,
    pub content_hash: Option<ContentHash>,
    pub blob: Option<BlobId>,
}

/// The consumed store interface.
///
/// Implementations serialize their own internal operations; the engine adds
/// no locking on top, so overlapping tree mutations against the same
/// subtree are a caller responsibility.
pub trait ResourceStore: Send + Sync {
    /// First node matching the filter, if any.
    fn query_node(&self, filter: &NodeFilter) -> Result<Option<VfsNode>, StoreError>;

    /// Immediate children of a node, in unspecified order.
    fn query_children(&self, parent: NodeId) -> Result<Vec<VfsNode>, StoreError>;

    /// Number of nodes matching the filter.
    fn count_matching(&self, filter: &NodeFilter) -> Result<u64, StoreError>;

    /// Insert a node under `parent` and return its assigned id.
    fn insert_node(
        &self,
        kind: NodeKind,
        name: &str,
        parent: NodeId,
        extra: NodeExtra,
    ) -> Result<NodeId, StoreError>;

    /// Delete a single node. The blob it owns is deleted with it; children
    /// are the caller's responsibility.
    fn delete_node(&self, id: NodeId) -> Result<(), StoreError>;

    /// Create a blob with a declared total size and return its id.
    fn create_blob(&self, size: u64) -> Result<BlobId, StoreError>;

    /// Read up to `len` bytes at `offset` into `buf`; returns the byte
    /// count actually read and sets the buffer's valid length to it.
    fn read_blob(
        &self,
        id: BlobId,
        buf: &mut BlockBuffer,
        len: usize,
        offset: u64,
    ) -> Result<usize, StoreError>;

    /// Write the first `len` valid bytes of `buf` at `offset`.
    fn write_blob(
        &self,
        id: BlobId,
        buf: &BlockBuffer,
        len: usize,
        offset: u64,
    ) -> Result<(), StoreError>;

    /// Declared total size of a blob.
    fn blob_size(&self, id: BlobId) -> Result<u64, StoreError>;
}

/// Read an entire blob into memory through chunked transfers.
///
/// Used by the thumbnail pipeline, which needs the full byte sequence for
/// decoding. Copy operations never call this; they stream chunk by chunk.
pub fn read_blob_to_vec(
    store: &dyn ResourceStore,
    id: BlobId,
    block_size: usize,
) -> Result<Vec<u8>, StoreError> {
    let size = store.blob_size(id)?;
    let mut out = Vec::with_capacity(size as usize);
    let mut buf = BlockBuffer::new(block_size);
    for chunk in crate::buffer::chunk_sizes(size, block_size) {
        let read = store.read_blob(id, &mut buf, chunk, out.len() as u64)?;
        out.extend_from_slice(&buf.as_slice()[..read]);
        buf.clear();
        if read < chunk {
            break;
        }
    }
    Ok(out)
}
