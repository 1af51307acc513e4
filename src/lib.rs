//! Cabinet: hierarchical resource synchronization and thumbnail caching.
//!
//! Copies, deletes, and browses tree-structured resources across the OS
//! filesystem and an application-managed local store, and asynchronously
//! loads, orientation-corrects, and caches image thumbnails from either
//! backend for display. The store itself is an external collaborator
//! consumed through [`store::ResourceStore`]; this crate produces data
//! structures and byte buffers for a UI to render, never the rendering.

pub mod browse;
pub mod buffer;
pub mod config;
pub mod copy;
pub mod error;
pub mod logging;
pub mod runner;
pub mod store;
pub mod thumbs;
pub mod types;
