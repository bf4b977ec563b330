//! On-disk snapshot store
//!
//! Manages the state directory (default `.pollmon/` under the monitored
//! root):
//! ```text
//! .pollmon/
//!   statefile      one line per file: <mtime>\t<size>\t<path>
//! .pollmon.lock    single-writer lock held by the CLI
//! ```
//!
//! Writes go to a scratch file first and then replace the state file
//! atomically, so readers only ever see a complete snapshot.

use crate::config::StateConfig;
use crate::error::{Error, Result};
use crate::scratch::ScratchAllocator;
use crate::snapshot::{FileRecord, Snapshot};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Prefix for scratch files
const SCRATCH_PREFIX: &str = "pollmon";

/// Snapshot persistence for one monitored root
///
/// A disabled store loads nothing and persists nothing.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    location: Option<StateLocation>,
    scratch: ScratchAllocator,
}

#[derive(Debug, Clone)]
struct StateLocation {
    dir: PathBuf,
    file: PathBuf,
}

impl SnapshotStore {
    /// Open the store described by `config` for the tree at `root`
    ///
    /// Clears existing state first when `clear_existing` is set, then
    /// creates the state directory if it is missing.
    pub fn open(root: &Path, config: &StateConfig, scratch: ScratchAllocator) -> Result<Self> {
        if !config.enabled {
            debug!("State persistence disabled");
            return Ok(Self::disabled());
        }

        let dir = resolve_state_dir(root, config)?;

        let store = Self {
            location: Some(StateLocation {
                file: dir.join(&config.file_name),
                dir,
            }),
            scratch,
        };

        if config.clear_existing {
            store.clear();
        }
        store.ensure_dir()?;

        Ok(store)
    }

    /// A store that never touches the disk
    pub fn disabled() -> Self {
        Self {
            location: None,
            scratch: ScratchAllocator::system(),
        }
    }

    /// Whether snapshots are persisted
    pub fn is_enabled(&self) -> bool {
        self.location.is_some()
    }

    /// State directory, if enabled
    pub fn state_dir(&self) -> Option<&Path> {
        self.location.as_ref().map(|l| l.dir.as_path())
    }

    /// State file path, if enabled
    pub fn state_file(&self) -> Option<&Path> {
        self.location.as_ref().map(|l| l.file.as_path())
    }

    /// Lock file guarding the state directory, if enabled
    pub fn lock_file(&self) -> Option<PathBuf> {
        self.location.as_ref().map(|l| lock_path(&l.dir))
    }

    /// State paths (directory and lock file) that lie inside `root`,
    /// relative to it
    ///
    /// The scanner skips these so the monitor never reports its own
    /// bookkeeping.
    pub fn paths_within(&self, root: &Path) -> Vec<PathBuf> {
        let Some(loc) = &self.location else {
            return Vec::new();
        };
        let Ok(root) = fs::canonicalize(root) else {
            return Vec::new();
        };

        [loc.dir.clone(), lock_path(&loc.dir)]
            .iter()
            .filter_map(|path| real_path(path))
            .filter_map(|path| path.strip_prefix(&root).ok().map(Path::to_path_buf))
            .filter(|rel| !rel.as_os_str().is_empty())
            .collect()
    }

    fn ensure_dir(&self) -> Result<()> {
        let Some(loc) = &self.location else {
            return Ok(());
        };

        if !loc.dir.is_dir() {
            fs::create_dir_all(&loc.dir).map_err(|source| Error::StateDir {
                path: loc.dir.clone(),
                source,
            })?;
            debug!("Created state directory {}", loc.dir.display());
        }
        Ok(())
    }

    /// Load the last persisted snapshot
    ///
    /// A missing state file is an empty snapshot. Any malformed line or
    /// repeated path rejects the whole file.
    pub fn load(&self) -> Result<Snapshot> {
        let Some(loc) = &self.location else {
            return Ok(Snapshot::new());
        };

        let file = match File::open(&loc.file) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", loc.file.display());
                return Ok(Snapshot::new());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut line_no = 0;

        // Only `\n` ends a line; a `\r` is part of the path
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_no += 1;
            if line.last() == Some(&b'\n') {
                line.pop();
            }

            let corrupt = |reason: String| Error::CorruptState {
                path: loc.file.clone(),
                line: line_no,
                reason,
            };

            let record = parse_line(&line).map_err(corrupt)?;
            if !seen.insert(record.path.clone()) {
                return Err(corrupt(format!(
                    "duplicate path {}",
                    record.path.display()
                )));
            }
            records.push(record);
        }

        debug!("Loaded {} records from {}", records.len(), loc.file.display());
        Ok(Snapshot::from(records))
    }

    /// Persist `snapshot`, replacing the state file atomically
    pub fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(loc) = &self.location else {
            return Ok(());
        };

        fs::create_dir_all(&loc.dir).map_err(|e| Error::persist(&loc.dir, e))?;

        let scratch = self
            .scratch
            .allocate(SCRATCH_PREFIX)
            .ok_or_else(|| Error::ScratchExhausted {
                prefix: SCRATCH_PREFIX.to_string(),
                dir: self.scratch.dir().to_path_buf(),
            })?;

        let result = write_records(&scratch, snapshot)
            .map_err(|e| Error::persist(&scratch, e))
            .and_then(|()| {
                replace_file(&scratch, &loc.file, &loc.dir).map_err(|e| Error::persist(&loc.file, e))
            });

        // Gone already when the rename succeeded
        if let Err(e) = fs::remove_file(&scratch) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove scratch file {}: {}", scratch.display(), e);
            }
        }

        if result.is_ok() {
            debug!("Persisted {} records to {}", snapshot.len(), loc.file.display());
        }
        result
    }

    /// Remove the state file and its directory
    ///
    /// Returns `false` when removal was blocked; the failure is logged and
    /// is never fatal.
    pub fn clear(&self) -> bool {
        let Some(loc) = &self.location else {
            return true;
        };

        if let Err(e) = fs::remove_file(&loc.file) {
            if e.kind() != ErrorKind::NotFound {
                debug!("Could not remove {}: {}", loc.file.display(), e);
            }
        }

        match fs::remove_dir_all(&loc.dir) {
            Ok(()) => {
                debug!("Cleared state directory {}", loc.dir.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to clear state directory {}: {}", loc.dir.display(), e);
                false
            }
        }
    }
}

/// Lock file path for `state_dir`: a sibling named `<dir>.lock`, so
/// clearing the directory never unlinks a held lock
pub fn lock_path(state_dir: &Path) -> PathBuf {
    let mut name = state_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(".lock");
    state_dir.with_file_name(name)
}

/// Resolve the state directory for `root`
///
/// Rejects directories given with `..` and any that are the root or one
/// of its ancestors; clearing one of those would delete monitored data.
pub fn resolve_state_dir(root: &Path, config: &StateConfig) -> Result<PathBuf> {
    let dir = config.resolve_dir(root);

    let has_parent_ref = config
        .dir
        .components()
        .any(|c| matches!(c, Component::ParentDir));

    let contains_root = root.starts_with(&dir)
        || match (fs::canonicalize(root), real_path(&dir)) {
            (Ok(root), Some(dir)) => root.starts_with(dir),
            _ => false,
        };

    if has_parent_ref || contains_root {
        return Err(Error::Config(format!(
            "state directory {} must not contain the monitored root {} or use `..`",
            dir.display(),
            root.display()
        )));
    }
    Ok(dir)
}

/// Canonical form of `path`, resolving only the parent when `path` itself
/// does not exist yet
fn real_path(path: &Path) -> Option<PathBuf> {
    match fs::canonicalize(path) {
        Ok(real) => Some(real),
        Err(_) => {
            let name = path.file_name()?;
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            fs::canonicalize(parent).ok().map(|p| p.join(name))
        }
    }
}

/// Whether `path` survives a write/load cycle through the state file
pub(crate) fn is_storable(path: &Path) -> bool {
    path_bytes(path).is_some_and(|b| !b.is_empty() && !b.contains(&b'\n'))
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Option<&[u8]> {
    use std::os::unix::ffi::OsStrExt;
    Some(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Option<&[u8]> {
    path.to_str().map(str::as_bytes)
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStrExt;
    Some(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> Option<PathBuf> {
    std::str::from_utf8(bytes).ok().map(PathBuf::from)
}

/// Parse `<mtime>\t<size>\t<path>`; the path is every byte after the
/// second tab
fn parse_line(line: &[u8]) -> std::result::Result<FileRecord, String> {
    let mut fields = line.splitn(3, |b| *b == b'\t');

    let modified = number_field(fields.next(), "modification time")?;
    let size = number_field(fields.next(), "size")?;

    let path = fields
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| "missing path".to_string())?;
    let path = path_from_bytes(path).ok_or_else(|| "path is not valid UTF-8".to_string())?;

    Ok(FileRecord::new(path, modified, size))
}

fn number_field<T>(field: Option<&[u8]>, name: &str) -> std::result::Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let field = field
        .filter(|f| !f.is_empty())
        .ok_or_else(|| format!("missing {name}"))?;
    std::str::from_utf8(field)
        .map_err(|_| format!("bad {name}: not UTF-8"))?
        .parse::<T>()
        .map_err(|e| format!("bad {name}: {e}"))
}

fn write_records(path: &Path, snapshot: &Snapshot) -> io::Result<()> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut writer = BufWriter::new(file);

    for record in snapshot {
        let path_bytes = path_bytes(&record.path)
            .filter(|_| is_storable(&record.path))
            .ok_or_else(|| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("path {} cannot be stored", record.path.display()),
                )
            })?;

        write!(writer, "{}\t{}\t", record.modified, record.size)?;
        writer.write_all(path_bytes)?;
        writer.write_all(b"\n")?;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Move `scratch` over `target`
///
/// A plain rename when both live on one filesystem; otherwise the bytes
/// are staged next to `target` and that staging file is renamed instead.
fn replace_file(scratch: &Path, target: &Path, dir: &Path) -> io::Result<()> {
    if let Err(e) = fs::rename(scratch, target) {
        debug!(
            "Rename {} -> {} failed ({}), staging in {}",
            scratch.display(),
            target.display(),
            e,
            dir.display()
        );

        let mut staged = NamedTempFile::new_in(dir)?;
        let mut source = File::open(scratch)?;
        io::copy(&mut source, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        staged.persist(target).map_err(|e| e.error)?;
    }

    sync_dir(dir);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("Could not sync {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
