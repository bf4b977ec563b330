//! File records and directory snapshots

use std::path::{Path, PathBuf};

/// One regular file observed during a scan
///
/// Identity is `path` alone; `modified` is the only change signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    /// Path relative to the monitored root
    pub path: PathBuf,
    /// Modification time, whole seconds since the Unix epoch
    pub modified: i64,
    /// Size in bytes (stored, never compared)
    pub size: u64,
}

impl FileRecord {
    /// Create a new record
    pub fn new(path: impl Into<PathBuf>, modified: i64, size: u64) -> Self {
        Self {
            path: path.into(),
            modified,
            size,
        }
    }
}

/// The complete regular-file contents of a tree at one point in time
///
/// Immutable once built. Records keep scan order, which is deterministic
/// so persisted output is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: Vec<FileRecord>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the snapshot has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in order
    pub fn iter(&self) -> std::slice::Iter<'_, FileRecord> {
        self.records.iter()
    }

    /// Records as a slice
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Look up a record by path (linear; use an index for bulk lookups)
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.path == path)
    }
}

impl From<Vec<FileRecord>> for Snapshot {
    fn from(records: Vec<FileRecord>) -> Self {
        Self { records }
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a FileRecord;
    type IntoIter = std::slice::Iter<'a, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
