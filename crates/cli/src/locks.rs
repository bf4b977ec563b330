//! Lock file management for single-writer state directories

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub use pollmon_core::lock_path;

/// Attempts before giving up when the lock file keeps being replaced
const MAX_OPEN_ATTEMPTS: usize = 3;

/// Exclusive lock on a state directory
///
/// Lives beside the directory (`<state_dir>.lock`) so clearing the state
/// directory never unlinks a held lock.
pub struct StateLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: u64,
}

impl StateLock {
    /// Acquire the exclusive lock for `state_dir`
    ///
    /// The flock itself is the source of truth: the kernel drops it when
    /// the holder exits, so a file nobody has flocked is stale and is
    /// simply taken over. Returns error if:
    /// - Lock is held by another process (live or still starting up)
    /// - Permission denied
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        let lock_path = lock_path(state_dir);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        for _ in 0..MAX_OPEN_ATTEMPTS {
            let mut file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

            if !try_flock_exclusive(&file)? {
                let holder = Self::read_lock_content(&mut file)
                    .map(|content| content.pid.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                anyhow::bail!(
                    "State directory {} is in use by another pollmon (pid {})",
                    state_dir.display(),
                    holder
                );
            }

            // The previous holder may have unlinked the file between our
            // open and flock; that lock guards nothing
            if !is_current(&file, &lock_path) {
                tracing::debug!("Lock file {} was replaced, retrying", lock_path.display());
                continue;
            }

            if let Ok(previous) = Self::read_lock_content(&mut file) {
                tracing::warn!(
                    "Taking over stale lock {} (pid {})",
                    lock_path.display(),
                    previous.pid
                );
            }

            Self::write_lock_content(&mut file)?;

            return Ok(Self {
                path: lock_path,
                file,
            });
        }

        anyhow::bail!(
            "Lock file {} kept changing while acquiring it",
            lock_path.display()
        )
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock and remove the lock file
    pub fn release(self) -> Result<()> {
        std::fs::remove_file(&self.path).context("Failed to remove lock file")?;
        Ok(())
    }

    /// Write lock content (PID + timestamp)
    fn write_lock_content(file: &mut File) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            started_at: current_timestamp_ms(),
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read lock content from file
    fn read_lock_content(file: &mut File) -> Result<LockContent> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let content: LockContent =
            serde_json::from_str(&contents).context("Failed to deserialize lock content")?;
        Ok(content)
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

/// Whether the open `file` is still the one linked at `path`
#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(open), Ok(linked)) => open.dev() == linked.dev() && open.ino() == linked.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_current(_file: &File, path: &Path) -> bool {
    path.exists()
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_lock_acquisition() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = temp_dir.path().join(".pollmon");

        // First lock should succeed
        let lock1 = StateLock::acquire(&state_dir);
        assert!(lock1.is_ok());

        // Second lock should fail (same process, but lock is held)
        let lock2 = StateLock::acquire(&state_dir);
        assert!(lock2.is_err());

        drop(lock1);

        let lock3 = StateLock::acquire(&state_dir);
        assert!(lock3.is_ok());
    }

    #[test]
    fn test_lock_release() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = temp_dir.path().join(".pollmon");

        let lock = StateLock::acquire(&state_dir).unwrap();
        let lock_path = lock.path().to_path_buf();
        assert!(lock_path.exists());

        lock.release().unwrap();
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_stale_lock_file_is_taken_over() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = temp_dir.path().join(".pollmon");

        // Left behind by a dead process: present but not flocked
        fs::write(lock_path(&state_dir), r#"{"pid":999999,"started_at":1}"#).unwrap();

        let lock = StateLock::acquire(&state_dir).unwrap();
        let mut file = File::open(lock.path()).unwrap();
        let content = StateLock::read_lock_content(&mut file).unwrap();
        assert_eq!(content.pid, std::process::id());
    }

    #[test]
    fn test_lock_content() {
        let temp_dir = TempDir::new().unwrap();
        let lock_file = temp_dir.path().join("test.lock");

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_file)
            .unwrap();

        StateLock::write_lock_content(&mut file).unwrap();
        let content = StateLock::read_lock_content(&mut file).unwrap();

        assert_eq!(content.pid, std::process::id());
        assert!(content.started_at > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_held_lock_without_content_is_not_stolen() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = temp_dir.path().join(".pollmon");
        let path = lock_path(&state_dir);

        // Holder has flocked but not yet written its pid
        let holder = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        assert!(try_flock_exclusive(&holder).unwrap());

        let err = StateLock::acquire(&state_dir).err().unwrap();
        assert!(err.to_string().contains("pid unknown"), "{err}");
        assert!(path.exists());
        assert!(is_current(&holder, &path));

        drop(holder);
        assert!(StateLock::acquire(&state_dir).is_ok());
    }

    #[test]
    fn test_busy_lock_names_holder() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = temp_dir.path().join(".pollmon");

        let _held = StateLock::acquire(&state_dir).unwrap();
        let err = StateLock::acquire(&state_dir).err().unwrap();
        assert!(
            err.to_string().contains(&std::process::id().to_string()),
            "{err}"
        );
    }
}
