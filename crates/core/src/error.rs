//! Error types shared by the pollmon crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pollmon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad class of an [`Error`], used by callers to pick a halt policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or unusable configuration (root, interval, state directory)
    Configuration,
    /// The persisted state file could not be parsed
    Corruption,
    /// A snapshot could not be written out
    Persistence,
    /// Any other I/O failure
    Io,
}

/// Errors surfaced by the scan, store and watch loop.
///
/// Transient scan failures (an unreadable subtree) are never reported here;
/// the builder skips them.
#[derive(Error, Debug)]
pub enum Error {
    /// No root directory configured.
    #[error("no directory set to monitor")]
    NoRoot,

    /// Root directory could not be statted.
    #[error("cannot read monitored directory {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root exists but is not a directory.
    #[error("monitored path {0} is not a directory")]
    RootNotDirectory(PathBuf),

    /// Poll interval out of range.
    #[error("poll interval must be at least 1 second, got {0}")]
    InvalidInterval(u64),

    /// State directory could not be created or inspected.
    #[error("cannot create state directory {path}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file unreadable or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed line in the state file.
    #[error("corrupt state file {path} at line {line}: {reason}")]
    CorruptState {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Scratch allocator ran out of attempts.
    #[error("no free scratch path for prefix {prefix:?} in {dir}")]
    ScratchExhausted { prefix: String, dir: PathBuf },

    /// Writing or replacing the state file failed.
    #[error("failed to persist state to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoRoot
            | Error::RootUnreadable { .. }
            | Error::RootNotDirectory(_)
            | Error::InvalidInterval(_)
            | Error::StateDir { .. }
            | Error::Config(_) => ErrorKind::Configuration,
            Error::CorruptState { .. } => ErrorKind::Corruption,
            Error::ScratchExhausted { .. } | Error::Persist { .. } => ErrorKind::Persistence,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Persist {
            path: path.into(),
            source,
        }
    }
}
