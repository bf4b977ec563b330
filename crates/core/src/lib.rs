//! Core data model and storage for pollmon
//!
//! This crate provides:
//! - File records and snapshots of a directory tree
//! - The snapshot builder (recursive, hidden-entry aware scan)
//! - The snapshot store (line-format state file with atomic replace)
//! - Scratch path allocation for staged writes
//! - Monitor configuration and the shared error type

pub mod config;
pub mod error;
pub mod scan;
pub mod scratch;
pub mod snapshot;
pub mod store;

// Re-exports
pub use config::{MonitorConfig, PersistFailure, StateConfig};
pub use error::{Error, ErrorKind, Result};
pub use scan::{build_snapshot, build_snapshot_excluding, check_root};
pub use scratch::ScratchAllocator;
pub use snapshot::{FileRecord, Snapshot};
pub use store::{lock_path, resolve_state_dir, SnapshotStore};
