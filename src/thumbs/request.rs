//! Image request identity parsing.
//!
//! A request identity is an opaque URL-like string produced by the UI
//! bridge; the full string doubles as the cache key. Recognized query
//! parameters: `blobId`, `source` (1 filesystem, 2 local store), `bound`
//! (pixel bound for the longer dimension, 0 keeps the original size),
//! `async` (0 synchronous, 1 asynchronous) and `keep` (1 retains the
//! cache entry, 0 consumes it on async reads). Unknown parameters are
//! ignored.

use crate::error::ThumbError;
use crate::types::{BlobId, Origin};
use std::path::PathBuf;

/// Parsed image request.
#[derive(Debug, Clone)]
pub struct ThumbRequest {
    /// The full identity string; also the cache key.
    pub identity: String,
    /// Filesystem path (filesystem source only).
    pub path: PathBuf,
    /// Blob id (local-store source only).
    pub blob_id: BlobId,
    pub source: Origin,
    /// Requested bound for the longer dimension; 0 means original size.
    pub bound: u32,
    pub asynchronous: bool,
    /// Whether an async read retains the cache entry.
    pub keep: bool,
}

impl ThumbRequest {
    /// Parse an identity string.
    pub fn parse(identity: &str) -> Result<Self, ThumbError> {
        let rest = identity
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(identity);
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };

        let mut blob_id: BlobId = 0;
        let mut source = Origin::FileSystem;
        let mut bound: u32 = 0;
        let mut asynchronous = false;
        let mut keep = true;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "blobId" => {
                    blob_id = value.parse().map_err(|_| {
                        ThumbError::BadRequest(format!("invalid blobId: {:?}", value))
                    })?;
                }
                "source" => {
                    let tag: u8 = value.parse().map_err(|_| {
                        ThumbError::BadRequest(format!("invalid source: {:?}", value))
                    })?;
                    source = Origin::from_tag(tag).ok_or_else(|| {
                        ThumbError::BadRequest(format!("unknown source tag: {}", tag))
                    })?;
                }
                "bound" => {
                    bound = value.parse().map_err(|_| {
                        ThumbError::BadRequest(format!("invalid bound: {:?}", value))
                    })?;
                }
                "async" => asynchronous = value == "1",
                "keep" => keep = value != "0",
                _ => {}
            }
        }

        if source == Origin::LocalStore && blob_id == 0 {
            return Err(ThumbError::BadRequest(
                "local-store request without blobId".to_string(),
            ));
        }
        if source == Origin::FileSystem && path.is_empty() {
            return Err(ThumbError::BadRequest(
                "filesystem request without path".to_string(),
            ));
        }

        Ok(Self {
            identity: identity.to_string(),
            path: PathBuf::from(path),
            blob_id,
            source,
            bound,
            asynchronous,
            keep,
        })
    }
}
