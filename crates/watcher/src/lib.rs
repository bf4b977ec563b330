//! Poll-based change detection for pollmon
//!
//! This crate provides:
//! - Change callbacks (add / delete / modify)
//! - The three-way concurrent snapshot differ
//! - The watch loop that scans, compares and persists on an interval

pub mod callbacks;
pub mod diff;
pub mod monitor;

pub use callbacks::{Callback, Callbacks};
pub use diff::{compare, ChangeSet};
pub use monitor::Monitor;

/// Type of change reported for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// File appeared since the previous scan
    Add,
    /// File disappeared since the previous scan
    Delete,
    /// File modification time changed
    Modify,
}
