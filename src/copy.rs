//! Tree replication across backends.
//!
//! [`TreeCopyEngine`] copies a single file or an entire subtree in any of
//! the four directions between the OS filesystem and the local store. All
//! content moves through one reusable [`BlockBuffer`]; recursion is
//! depth-first with directories visited before files in stable name order.
//!
//! Collision handling is an explicit [`CollisionPolicy`] parameter rather
//! than a rule baked into each direction. Directory copies never merge: an
//! existing same-named destination entry is resolved by the policy before
//! any mutation, and `Fail` (the default at the browse call sites) aborts
//! the whole call.

use crate::buffer::{chunk_sizes, BlockBuffer};
use crate::config::EngineConfig;
use crate::error::CopyError;
use crate::store::{NodeExtra, NodeFilter, ResourceStore, VfsNode};
use crate::types::{NodeId, NodeKind};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Rule applied when a copy's destination name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Treat the copy as already satisfied; no overwrite, no error.
    Skip,
    /// Abort with [`CopyError::Collision`].
    Fail,
    /// Delete the existing destination entry, then copy.
    Overwrite,
    /// Derive a free name by suffixing ` (n)` and copy under it.
    AlwaysCreate,
}

/// Rule applied when a child of a recursive copy fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildFailurePolicy {
    /// Abort the parent call on the first child error.
    FailFast,
    /// Log each child error, keep going, and report the first error after
    /// the remaining children have been attempted.
    Continue,
}

/// What a copy operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The destination already satisfied the copy under the `Skip` policy.
    Skipped,
}

/// Recursive copy engine over both backends.
pub struct TreeCopyEngine {
    store: Arc<dyn ResourceStore>,
    block_size: usize,
}

impl TreeCopyEngine {
    pub fn new(store: Arc<dyn ResourceStore>, block_size: usize) -> Self {
        Self { store, block_size }
    }

    pub fn from_config(store: Arc<dyn ResourceStore>, config: &EngineConfig) -> Self {
        Self::new(store, config.block_size)
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    // ---- OS -> OS ----

    /// Copy one file between filesystem directories.
    pub fn copy_file(
        &self,
        src: &Path,
        dst_dir: &Path,
        policy: CollisionPolicy,
    ) -> Result<CopyOutcome, CopyError> {
        let name = file_name(src)?;
        if !src.is_file() {
            return Err(CopyError::NotFound(src.display().to_string()));
        }
        // the destination slot aliasing the source would let Overwrite
        // delete the source before reading it
        if same_or_descendant(src, &dst_dir.join(&name)) {
            return Err(CopyError::SelfReference);
        }
        let dst = match self.resolve_fs_collision(dst_dir, &name, NodeKind::File, policy)? {
            Some(path) => path,
            None => return Ok(CopyOutcome::Skipped),
        };

        let size = src
            .metadata()
            .map_err(|e| CopyError::io(src, e))?
            .len();
        let mut reader = File::open(src).map_err(|e| CopyError::io(src, e))?;
        let mut writer = File::create(&dst).map_err(|e| CopyError::io(&dst, e))?;
        let mut buf = BlockBuffer::new(self.block_size);
        for chunk in chunk_sizes(size, self.block_size) {
            reader
                .read_exact(&mut buf.as_mut_slice()[..chunk])
                .map_err(|e| CopyError::io(src, e))?;
            buf.set_len(chunk);
            writer
                .write_all(buf.as_slice())
                .map_err(|e| CopyError::io(&dst, e))?;
            buf.clear();
        }

        debug!(src = %src.display(), dst = %dst.display(), size, "copied file");
        Ok(CopyOutcome::Copied)
    }

    /// Recursively copy a filesystem directory into another directory.
    pub fn copy_directory(
        &self,
        src: &Path,
        dst_dir: &Path,
        policy: CollisionPolicy,
        on_child: ChildFailurePolicy,
    ) -> Result<CopyOutcome, CopyError> {
        if !src.is_dir() {
            return Err(CopyError::NotFound(src.display().to_string()));
        }
        let name = file_name(src)?;
        // rejects dst inside src and dst_dir/name aliasing src itself
        if same_or_descendant(src, dst_dir) || same_or_descendant(src, &dst_dir.join(&name)) {
            return Err(CopyError::SelfReference);
        }
        let dst = match self.resolve_fs_collision(dst_dir, &name, NodeKind::Directory, policy)? {
            Some(path) => path,
            None => return Ok(CopyOutcome::Skipped),
        };
        std::fs::create_dir(&dst).map_err(|e| CopyError::io(&dst, e))?;

        let mut first_err: Option<CopyError> = None;
        for entry in list_dir_ordered(src)? {
            let result = if entry.is_dir() {
                self.copy_directory(&entry, &dst, CollisionPolicy::Fail, on_child)
                    .map(|_| ())
            } else {
                self.copy_file(&entry, &dst, CollisionPolicy::Fail).map(|_| ())
            };
            if let Err(e) = result {
                match on_child {
                    ChildFailurePolicy::FailFast => return Err(e),
                    ChildFailurePolicy::Continue => {
                        warn!(child = %entry.display(), error = %e, "child copy failed, continuing");
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(CopyOutcome::Copied),
        }
    }

    // ---- OS -> store ----

    /// Stream a filesystem file into the store as a fresh blob plus a new
    /// file node, hashing the content along the way.
    pub fn ingest_file(
        &self,
        src: &Path,
        dst_parent: NodeId,
        policy: CollisionPolicy,
    ) -> Result<CopyOutcome, CopyError> {
        let name = file_name(src)?;
        if !src.is_file() {
            return Err(CopyError::NotFound(src.display().to_string()));
        }
        let name = match self.resolve_store_collision(dst_parent, &name, NodeKind::File, policy)? {
            Some(name) => name,
            None => return Ok(CopyOutcome::Skipped),
        };

        let size = src
            .metadata()
            .map_err(|e| CopyError::io(src, e))?
            .len();
        let blob = self.store.create_blob(size)?;

        let mut reader = File::open(src).map_err(|e| CopyError::io(src, e))?;
        let mut buf = BlockBuffer::new(self.block_size);
        let mut hasher = blake3::Hasher::new();
        let mut offset = 0u64;
        for chunk in chunk_sizes(size, self.block_size) {
            reader
                .read_exact(&mut buf.as_mut_slice()[..chunk])
                .map_err(|e| CopyError::io(src, e))?;
            buf.set_len(chunk);
            hasher.update(buf.as_slice());
            self.store.write_blob(blob, &buf, chunk, offset)?;
            offset += chunk as u64;
            buf.clear();
        }
        let hash = *hasher.finalize().as_bytes();

        let id = self.store.insert_node(
            NodeKind::File,
            &name,
            dst_parent,
            NodeExtra {
                size,
                content_hash: Some(hash),
                blob: Some(blob),
            },
        )?;

        debug!(
            src = %src.display(),
            node = id,
            size,
            hash = %hex::encode(hash),
            "ingested file into store"
        );
        Ok(CopyOutcome::Copied)
    }

    /// Recursively ingest a filesystem directory under a store node.
    pub fn ingest_directory(
        &self,
        src: &Path,
        dst_parent: NodeId,
        policy: CollisionPolicy,
        on_child: ChildFailurePolicy,
    ) -> Result<CopyOutcome, CopyError> {
        if !src.is_dir() {
            return Err(CopyError::NotFound(src.display().to_string()));
        }
        let name = file_name(src)?;
        let name =
            match self.resolve_store_collision(dst_parent, &name, NodeKind::Directory, policy)? {
                Some(name) => name,
                None => return Ok(CopyOutcome::Skipped),
            };
        let dir_id =
            self.store
                .insert_node(NodeKind::Directory, &name, dst_parent, NodeExtra::default())?;

        let mut first_err: Option<CopyError> = None;
        for entry in list_dir_ordered(src)? {
            let result = if entry.is_dir() {
                self.ingest_directory(&entry, dir_id, CollisionPolicy::Fail, on_child)
                    .map(|_| ())
            } else {
                self.ingest_file(&entry, dir_id, CollisionPolicy::Fail).map(|_| ())
            };
            if let Err(e) = result {
                match on_child {
                    ChildFailurePolicy::FailFast => return Err(e),
                    ChildFailurePolicy::Continue => {
                        warn!(child = %entry.display(), error = %e, "child ingest failed, continuing");
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(CopyOutcome::Copied),
        }
    }

    // ---- store -> OS ----

    /// Stream a store file node's blob out to a filesystem directory.
    pub fn export_file(
        &self,
        src: NodeId,
        dst_dir: &Path,
        policy: CollisionPolicy,
    ) -> Result<CopyOutcome, CopyError> {
        let node = self.file_node(src)?;
        let dst = match self.resolve_fs_collision(dst_dir, &node.name, NodeKind::File, policy)? {
            Some(path) => path,
            None => return Ok(CopyOutcome::Skipped),
        };

        let mut writer = File::create(&dst).map_err(|e| CopyError::io(&dst, e))?;
        if let Some(blob) = node.blob {
            let mut buf = BlockBuffer::new(self.block_size);
            let mut offset = 0u64;
            for chunk in chunk_sizes(node.size, self.block_size) {
                let read = self.store.read_blob(blob, &mut buf, chunk, offset)?;
                writer
                    .write_all(&buf.as_slice()[..read])
                    .map_err(|e| CopyError::io(&dst, e))?;
                offset += read as u64;
                buf.clear();
            }
        }

        debug!(node = src, dst = %dst.display(), size = node.size, "exported file from store");
        Ok(CopyOutcome::Copied)
    }

    /// Recursively export a store directory node to the filesystem.
    pub fn export_directory(
        &self,
        src: NodeId,
        dst_dir: &Path,
        policy: CollisionPolicy,
        on_child: ChildFailurePolicy,
    ) -> Result<CopyOutcome, CopyError> {
        let node = self.dir_node(src)?;
        let dst = match self.resolve_fs_collision(dst_dir, &node.name, NodeKind::Directory, policy)?
        {
            Some(path) => path,
            None => return Ok(CopyOutcome::Skipped),
        };
        std::fs::create_dir(&dst).map_err(|e| CopyError::io(&dst, e))?;

        let mut first_err: Option<CopyError> = None;
        for child in self.children_ordered(src)? {
            let result = match child.kind {
                NodeKind::Directory => self
                    .export_directory(child.id, &dst, CollisionPolicy::Fail, on_child)
                    .map(|_| ()),
                NodeKind::File => self
                    .export_file(child.id, &dst, CollisionPolicy::Fail)
                    .map(|_| ()),
            };
            if let Err(e) = result {
                match on_child {
                    ChildFailurePolicy::FailFast => return Err(e),
                    ChildFailurePolicy::Continue => {
                        warn!(child = child.id, error = %e, "child export failed, continuing");
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(CopyOutcome::Copied),
        }
    }

    // ---- store -> store ----

    /// Copy one file node under another parent. The new node gets its own
    /// blob; blobs are never shared between nodes.
    pub fn copy_node(
        &self,
        src: NodeId,
        dst_parent: NodeId,
        policy: CollisionPolicy,
    ) -> Result<CopyOutcome, CopyError> {
        let node = self.file_node(src)?;
        // a colliding node that is the source itself would let Overwrite
        // delete the source blob before duplicating it
        if self
            .store
            .query_node(&NodeFilter::named_child(dst_parent, &node.name).kind(NodeKind::File))?
            .map_or(false, |existing| existing.id == src)
        {
            return Err(CopyError::SelfReference);
        }
        let name =
            match self.resolve_store_collision(dst_parent, &node.name, NodeKind::File, policy)? {
                Some(name) => name,
                None => return Ok(CopyOutcome::Skipped),
            };

        let blob = match node.blob {
            Some(src_blob) => Some(self.duplicate_blob(src_blob, node.size)?),
            None => None,
        };
        let id = self.store.insert_node(
            NodeKind::File,
            &name,
            dst_parent,
            NodeExtra {
                size: node.size,
                content_hash: node.content_hash,
                blob,
            },
        )?;

        debug!(src, node = id, parent = dst_parent, "copied store node");
        Ok(CopyOutcome::Copied)
    }

    /// Recursively copy a store directory node under another parent.
    pub fn copy_node_tree(
        &self,
        src: NodeId,
        dst_parent: NodeId,
        policy: CollisionPolicy,
        on_child: ChildFailurePolicy,
    ) -> Result<CopyOutcome, CopyError> {
        if src == dst_parent || self.is_descendant(dst_parent, src)? {
            return Err(CopyError::SelfReference);
        }
        let node = self.dir_node(src)?;
        let name = match self.resolve_store_collision(
            dst_parent,
            &node.name,
            NodeKind::Directory,
            policy,
        )? {
            Some(name) => name,
            None => return Ok(CopyOutcome::Skipped),
        };
        let dir_id =
            self.store
                .insert_node(NodeKind::Directory, &name, dst_parent, NodeExtra::default())?;

        let mut first_err: Option<CopyError> = None;
        for child in self.children_ordered(src)? {
            let result = match child.kind {
                NodeKind::Directory => self
                    .copy_node_tree(child.id, dir_id, CollisionPolicy::Fail, on_child)
                    .map(|_| ()),
                NodeKind::File => self
                    .copy_node(child.id, dir_id, CollisionPolicy::Fail)
                    .map(|_| ()),
            };
            if let Err(e) = result {
                match on_child {
                    ChildFailurePolicy::FailFast => return Err(e),
                    ChildFailurePolicy::Continue => {
                        warn!(child = child.id, error = %e, "child copy failed, continuing");
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(CopyOutcome::Copied),
        }
    }

    /// Recursively delete a store node, children first. Blobs go with
    /// their owning nodes.
    pub fn delete_tree(&self, id: NodeId) -> Result<(), CopyError> {
        for child in self.store.query_children(id)? {
            self.delete_tree(child.id)?;
        }
        self.store.delete_node(id)?;
        Ok(())
    }

    // ---- helpers ----

    fn file_node(&self, id: NodeId) -> Result<VfsNode, CopyError> {
        self.store
            .query_node(&NodeFilter::by_id(id).kind(NodeKind::File))?
            .ok_or_else(|| CopyError::NotFound(format!("store node {}", id)))
    }

    fn dir_node(&self, id: NodeId) -> Result<VfsNode, CopyError> {
        self.store
            .query_node(&NodeFilter::by_id(id).kind(NodeKind::Directory))?
            .ok_or_else(|| CopyError::NotFound(format!("store node {}", id)))
    }

    /// Children of a store node, directories before files, each group in
    /// stable name order.
    fn children_ordered(&self, parent: NodeId) -> Result<Vec<VfsNode>, CopyError> {
        let mut children = self.store.query_children(parent)?;
        children.sort_by(|a, b| {
            dir_rank(a.kind)
                .cmp(&dir_rank(b.kind))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(children)
    }

    /// `true` when `node` lies inside the subtree rooted at `ancestor`.
    fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> Result<bool, CopyError> {
        let mut current = node;
        while current != 0 {
            if current == ancestor {
                return Ok(true);
            }
            match self.store.query_node(&NodeFilter::by_id(current))? {
                Some(n) => current = n.parent,
                None => break,
            }
        }
        Ok(false)
    }

    fn duplicate_blob(&self, src: crate::types::BlobId, size: u64) -> Result<crate::types::BlobId, CopyError> {
        let dst = self.store.create_blob(size)?;
        let mut buf = BlockBuffer::new(self.block_size);
        let mut offset = 0u64;
        for chunk in chunk_sizes(size, self.block_size) {
            let read = self.store.read_blob(src, &mut buf, chunk, offset)?;
            self.store.write_blob(dst, &buf, read, offset)?;
            offset += read as u64;
            buf.clear();
        }
        Ok(dst)
    }

    /// Resolve a filesystem destination for `name` under `dst_dir`.
    /// Returns the path to create, or None when the policy skips the copy.
    fn resolve_fs_collision(
        &self,
        dst_dir: &Path,
        name: &str,
        kind: NodeKind,
        policy: CollisionPolicy,
    ) -> Result<Option<PathBuf>, CopyError> {
        let candidate = dst_dir.join(name);
        let occupied = match kind {
            NodeKind::File => candidate.is_file(),
            NodeKind::Directory => candidate.is_dir(),
        };
        if !occupied {
            return Ok(Some(candidate));
        }
        match policy {
            CollisionPolicy::Skip => Ok(None),
            CollisionPolicy::Fail => Err(CopyError::Collision(name.to_string())),
            CollisionPolicy::Overwrite => {
                match kind {
                    NodeKind::File => std::fs::remove_file(&candidate)
                        .map_err(|e| CopyError::io(&candidate, e))?,
                    NodeKind::Directory => std::fs::remove_dir_all(&candidate)
                        .map_err(|e| CopyError::io(&candidate, e))?,
                }
                Ok(Some(candidate))
            }
            CollisionPolicy::AlwaysCreate => {
                for n in 1u32.. {
                    let alt = dst_dir.join(numbered_name(name, n));
                    if !alt.exists() {
                        return Ok(Some(alt));
                    }
                }
                unreachable!()
            }
        }
    }

    /// Resolve a store destination name for `name` under `parent`.
    /// Returns the name to insert under, or None when the policy skips.
    fn resolve_store_collision(
        &self,
        parent: NodeId,
        name: &str,
        kind: NodeKind,
        policy: CollisionPolicy,
    ) -> Result<Option<String>, CopyError> {
        let existing = self
            .store
            .query_node(&NodeFilter::named_child(parent, name).kind(kind))?;
        let existing = match existing {
            Some(node) => node,
            None => return Ok(Some(name.to_string())),
        };
        match policy {
            CollisionPolicy::Skip => Ok(None),
            CollisionPolicy::Fail => Err(CopyError::Collision(name.to_string())),
            CollisionPolicy::Overwrite => {
                self.delete_tree(existing.id)?;
                Ok(Some(name.to_string()))
            }
            CollisionPolicy::AlwaysCreate => {
                for n in 1u32.. {
                    let alt = numbered_name(name, n);
                    if self
                        .store
                        .count_matching(&NodeFilter::named_child(parent, &alt).kind(kind))?
                        == 0
                    {
                        return Ok(Some(alt));
                    }
                }
                unreachable!()
            }
        }
    }
}

fn dir_rank(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Directory => 0,
        NodeKind::File => 1,
    }
}

fn file_name(path: &Path) -> Result<String, CopyError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CopyError::NotFound(path.display().to_string()))
}

/// `name (n)`, keeping the extension last for file-like names.
fn numbered_name(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}

/// `true` when `candidate` equals `root` or lies inside it, after
/// canonicalization where possible.
fn same_or_descendant(root: &Path, candidate: &Path) -> bool {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let candidate = candidate
        .canonicalize()
        .unwrap_or_else(|_| candidate.to_path_buf());
    candidate.starts_with(&root)
}

/// Immediate children of a filesystem directory, directories before files,
/// each group in stable name order.
fn list_dir_ordered(dir: &Path) -> Result<Vec<PathBuf>, CopyError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            CopyError::io(
                path,
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed")),
            )
        })?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        } else {
            files.push(entry.into_path());
        }
    }
    dirs.extend(files);
    Ok(dirs)
}
