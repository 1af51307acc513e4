//! Core identifier and discriminator types shared across the engine.

use serde::{Deserialize, Serialize};

/// NodeId: store-assigned identifier of a VFS node. Zero denotes the root
/// container, which has no record of its own.
pub type NodeId = u64;

/// BlobId: store-assigned identifier of a binary blob.
pub type BlobId = u64;

/// ContentHash: blake3 digest of a file's content.
pub type ContentHash = [u8; 32];

/// Kind of a VFS node or filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Directory,
    File,
}

/// Backend that sourced a browsable item.
///
/// The numeric values are part of the UI contract: the filesystem is 1 and
/// the local store is 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Origin {
    FileSystem = 1,
    LocalStore = 2,
}

impl Origin {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Origin::FileSystem),
            2 => Some(Origin::LocalStore),
            _ => None,
        }
    }
}
