//! Snapshot builder
//!
//! Walks a directory tree and records every visible regular file.
//! Hidden entries (leading `.`) are skipped without descent, as are
//! symlinks and special files. Unreadable subtrees contribute nothing.

use crate::error::{Error, Result};
use crate::snapshot::{FileRecord, Snapshot};
use crate::store::is_storable;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Build a snapshot of every visible regular file under `root`
///
/// Fails only when the root itself cannot be statted or is not a
/// directory. Records carry root-relative paths in pre-order, sorted by
/// file name within each directory.
pub fn build_snapshot(root: &Path) -> Result<Snapshot> {
    build_snapshot_excluding(root, &[])
}

/// Like [`build_snapshot`], but also prunes the root-relative paths in
/// `excluded` (and everything below them)
pub fn build_snapshot_excluding(root: &Path, excluded: &[PathBuf]) -> Result<Snapshot> {
    check_root(root)?;

    let mut records = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(is_hidden(e) || is_excluded(e, root, excluded)))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        // Directories are descended by the walker; everything else that
        // isn't a regular file is dropped
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let Ok(rel_path) = entry.path().strip_prefix(root) else {
            continue;
        };

        if !is_storable(rel_path) {
            warn!(
                "Skipping {}: path cannot be stored in the state file",
                entry.path().display()
            );
            continue;
        }

        let modified = match metadata.modified() {
            Ok(time) => unix_seconds(time),
            Err(e) => {
                debug!("Skipping {}: no modification time: {}", entry.path().display(), e);
                continue;
            }
        };

        records.push(FileRecord::new(rel_path, modified, metadata.len()));
    }

    debug!("Scanned {} files under {}", records.len(), root.display());
    Ok(Snapshot::from(records))
}

/// Ensure `root` is set and is a readable directory
pub fn check_root(root: &Path) -> Result<()> {
    if root.as_os_str().is_empty() {
        return Err(Error::NoRoot);
    }

    let metadata = fs::metadata(root).map_err(|source| Error::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(Error::RootNotDirectory(root.to_path_buf()));
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().as_encoded_bytes().first() == Some(&b'.')
}

fn is_excluded(entry: &DirEntry, root: &Path, excluded: &[PathBuf]) -> bool {
    !excluded.is_empty()
        && entry
            .path()
            .strip_prefix(root)
            .is_ok_and(|rel| excluded.iter().any(|x| x == rel))
}

/// Whole seconds since the epoch, floored for pre-epoch times
fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => {
            let d = e.duration();
            let secs = d.as_secs() as i64;
            if d.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}
