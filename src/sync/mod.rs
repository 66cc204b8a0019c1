//! Manifest + Sync Engine (§4.8): incremental reconciliation between the on-disk
//! graph, the embedding cache, the search index and the current filesystem.

pub mod engine;
pub mod manifest;

pub use engine::{SyncEngine, SyncResult};
pub use manifest::{FileMeta, Manifest};
