//! Scratch path allocation for staged writes

use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default number of names tried before giving up
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// Hands out file paths in a scratch directory that nothing occupies
#[derive(Debug, Clone)]
pub struct ScratchAllocator {
    dir: PathBuf,
    max_attempts: usize,
}

impl ScratchAllocator {
    /// Allocator rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Allocator rooted at the system temp directory
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Override the attempt bound
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Scratch directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return `<dir>/<prefix><nnnnn>.tmp` for a name nothing currently uses
    ///
    /// A fresh random suffix is drawn on every attempt. `None` means the
    /// attempt bound was exhausted.
    pub fn allocate(&self, prefix: &str) -> Option<PathBuf> {
        let mut rng = rand::thread_rng();

        for _ in 0..self.max_attempts {
            let suffix: u32 = rng.gen_range(10_000..100_000);
            let path = self.dir.join(format!("{prefix}{suffix}.tmp"));

            match std::fs::symlink_metadata(&path) {
                Err(e) if e.kind() == ErrorKind::NotFound => return Some(path),
                _ => continue,
            }
        }

        None
    }
}

impl Default for ScratchAllocator {
    fn default() -> Self {
        Self::system()
    }
}
