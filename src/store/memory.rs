//! In-memory [`ResourceStore`].
//!
//! Reference implementation backing the integration tests. It keeps nodes
//! and blobs in maps behind a single lock and enforces transitive blob
//! deletion; name-collision checks are left to callers, matching the real
//! store.

use super::{NodeExtra, NodeFilter, ResourceStore, VfsNode};
use crate::buffer::BlockBuffer;
use crate::error::StoreError;
use crate::types::{BlobId, NodeId, NodeKind};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

struct Blob {
    size: u64,
    data: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeId, VfsNode>,
    blobs: HashMap<BlobId, Blob>,
    next_node: NodeId,
    next_blob: BlobId,
}

/// In-memory store; cheap to clone state out of, safe to share via `Arc`.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_node: 1,
                next_blob: 1,
                ..Inner::default()
            }),
        }
    }

    /// Total number of nodes, for test assertions.
    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Total number of blobs, for test assertions.
    pub fn blob_count(&self) -> usize {
        self.inner.read().blobs.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore for MemoryStore {
    fn query_node(&self, filter: &NodeFilter) -> Result<Option<VfsNode>, StoreError> {
        let inner = self.inner.read();
        if let Some(id) = filter.id {
            return Ok(inner.nodes.get(&id).filter(|n| filter.matches(n)).cloned());
        }
        Ok(inner.nodes.values().find(|n| filter.matches(n)).cloned())
    }

    fn query_children(&self, parent: NodeId) -> Result<Vec<VfsNode>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.parent == parent)
            .cloned()
            .collect())
    }

    fn count_matching(&self, filter: &NodeFilter) -> Result<u64, StoreError> {
        let inner = self.inner.read();
        Ok(inner.nodes.values().filter(|n| filter.matches(n)).count() as u64)
    }

    fn insert_node(
        &self,
        kind: NodeKind,
        name: &str,
        parent: NodeId,
        extra: NodeExtra,
    ) -> Result<NodeId, StoreError> {
        let mut inner = self.inner.write();
        if parent != 0 && !inner.nodes.contains_key(&parent) {
            return Err(StoreError::NodeNotFound(parent));
        }
        let id = inner.next_node;
        inner.next_node += 1;
        inner.nodes.insert(
            id,
            VfsNode {
                id,
                kind,
                name: name.to_string(),
                parent,
                size: extra.size,
                content_hash: extra.content_hash,
                blob: extra.blob,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn delete_node(&self, id: NodeId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .remove(&id)
            .ok_or(StoreError::NodeNotFound(id))?;
        if let Some(blob) = node.blob {
            inner.blobs.remove(&blob);
        }
        Ok(())
    }

    fn create_blob(&self, size: u64) -> Result<BlobId, StoreError> {
        let mut inner = self.inner.write();
        let id = inner.next_blob;
        inner.next_blob += 1;
        inner.blobs.insert(
            id,
            Blob {
                size,
                data: vec![0u8; size as usize],
            },
        );
        Ok(id)
    }

    fn read_blob(
        &self,
        id: BlobId,
        buf: &mut BlockBuffer,
        len: usize,
        offset: u64,
    ) -> Result<usize, StoreError> {
        let inner = self.inner.read();
        let blob = inner.blobs.get(&id).ok_or(StoreError::BlobNotFound(id))?;
        let start = offset.min(blob.size) as usize;
        let end = (start + len).min(blob.data.len()).min(start + buf.capacity());
        let n = end - start;
        buf.as_mut_slice()[..n].copy_from_slice(&blob.data[start..end]);
        buf.set_len(n);
        Ok(n)
    }

    fn write_blob(
        &self,
        id: BlobId,
        buf: &BlockBuffer,
        len: usize,
        offset: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let blob = inner
            .blobs
            .get_mut(&id)
            .ok_or(StoreError::BlobNotFound(id))?;
        let len = len.min(buf.len());
        if offset + len as u64 > blob.size {
            return Err(StoreError::BlobOutOfBounds {
                offset,
                len,
                size: blob.size,
            });
        }
        let start = offset as usize;
        blob.data[start..start + len].copy_from_slice(&buf.as_slice()[..len]);
        Ok(())
    }

    fn blob_size(&self, id: BlobId) -> Result<u64, StoreError> {
        let inner = self.inner.read();
        inner
            .blobs
            .get(&id)
            .map(|b| b.size)
            .ok_or(StoreError::BlobNotFound(id))
    }
}
