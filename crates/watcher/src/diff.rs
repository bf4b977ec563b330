//! Snapshot comparison
//!
//! Three independent passes (additions, deletions, modifications) run
//! concurrently on the rayon pool. `compare` returns once all three have
//! finished. Paths are matched by identity; only the modification time is
//! compared, never the size.

use crate::callbacks::Callbacks;
use crate::EventKind;
use ahash::AHashMap;
use pollmon_core::Snapshot;
use std::path::{Path, PathBuf};

/// path -> modification time
type Index<'a> = AHashMap<&'a Path, i64>;

fn index(snapshot: &Snapshot) -> Index<'_> {
    snapshot
        .iter()
        .map(|r| (r.path.as_path(), r.modified))
        .collect()
}

/// Paths of `snapshot` with no entry in `other`
fn missing_from<'a>(
    snapshot: &'a Snapshot,
    other: &'a Index<'a>,
) -> impl Iterator<Item = &'a Path> + 'a {
    snapshot
        .iter()
        .map(|r| r.path.as_path())
        .filter(move |p| !other.contains_key(p))
}

/// Paths present in both whose modification time differs
fn changed<'a>(new: &'a Snapshot, old: &'a Index<'a>) -> impl Iterator<Item = &'a Path> + 'a {
    new.iter()
        .filter(move |r| {
            old.get(r.path.as_path())
                .is_some_and(|&modified| modified != r.modified)
        })
        .map(|r| r.path.as_path())
}

/// Compare two snapshots and fire `callbacks` for every change
///
/// Blocks until the addition, deletion and modification passes have all
/// completed. Order of callbacks within and across passes is unspecified.
pub fn compare(old: &Snapshot, new: &Snapshot, callbacks: &Callbacks) {
    let old_index = index(old);
    let new_index = index(new);

    rayon::scope(|s| {
        if let Some(on_add) = callbacks.get(EventKind::Add) {
            let old_index = &old_index;
            s.spawn(move |_| missing_from(new, old_index).for_each(|p| on_add(p)));
        }

        if let Some(on_delete) = callbacks.get(EventKind::Delete) {
            let new_index = &new_index;
            s.spawn(move |_| missing_from(old, new_index).for_each(|p| on_delete(p)));
        }

        if let Some(on_modify) = callbacks.get(EventKind::Modify) {
            let old_index = &old_index;
            s.spawn(move |_| changed(new, old_index).for_each(|p| on_modify(p)));
        }
    });
}

fn sorted<'a>(paths: impl Iterator<Item = &'a Path>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = paths.map(Path::to_path_buf).collect();
    out.sort();
    out
}

/// Sorted lists of changed paths between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
}

impl ChangeSet {
    /// Compute the changes from `old` to `new`
    pub fn between(old: &Snapshot, new: &Snapshot) -> Self {
        let old_index = index(old);
        let new_index = index(new);

        Self {
            added: sorted(missing_from(new, &old_index)),
            deleted: sorted(missing_from(old, &new_index)),
            modified: sorted(changed(new, &old_index)),
        }
    }

    /// Total number of changed paths
    pub fn len(&self) -> usize {
        self.added.len() + self.deleted.len() + self.modified.len()
    }

    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
