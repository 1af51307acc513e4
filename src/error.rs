//! Error taxonomy for the engine.
//!
//! Every failure is local to the operation or request that produced it;
//! nothing here is fatal to the process. Copy operations carry a typed
//! error instead of a bare success flag so batch callers can report
//! per-item outcomes.

use crate::types::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by a [`ResourceStore`](crate::store::ResourceStore)
/// implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("blob {0} not found")]
    BlobNotFound(u64),

    #[error("blob write out of bounds: offset {offset} + len {len} > size {size}")]
    BlobOutOfBounds { offset: u64, len: usize, size: u64 },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors produced by tree copy and delete operations.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("destination already contains an item named {0:?}")]
    Collision(String),

    #[error("source and destination are the same subtree")]
    SelfReference,

    #[error("i/o failure at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CopyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CopyError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors produced by the thumbnail pipeline.
#[derive(Debug, Error)]
pub enum ThumbError {
    #[error("image source not found: {0}")]
    NotFound(String),

    #[error("i/o failure reading image: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("malformed image request: {0}")]
    BadRequest(String),
}

/// Errors raised while initializing logging or loading configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
