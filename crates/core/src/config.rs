//! Monitor configuration
//!
//! Loaded from an optional TOML file and then overridden by command-line
//! flags. Immutable once the watch loop starts.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default poll interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 3;

/// Default state directory, relative to the monitored root
pub const DEFAULT_STATE_DIR: &str = ".pollmon";

/// Default state file name
pub const DEFAULT_STATE_FILE: &str = "statefile";

/// Top-level monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory to monitor
    pub root: PathBuf,
    /// Seconds to sleep between scans
    pub interval_secs: u64,
    /// State file settings
    pub state: StateConfig,
    /// What to do when a snapshot cannot be persisted
    pub on_persist_error: PersistFailure,
}

/// State file settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Persist snapshots between runs
    pub enabled: bool,
    /// State directory; relative paths are resolved against the root
    pub dir: PathBuf,
    /// File name inside the state directory
    pub file_name: String,
    /// Remove existing state before the first scan
    pub clear_existing: bool,
}

/// Policy for persistence failures inside the watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistFailure {
    /// Stop the loop and surface the error
    #[default]
    Halt,
    /// Log the failure and retry on the next cycle
    Warn,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            interval_secs: DEFAULT_INTERVAL_SECS,
            state: StateConfig::default(),
            on_persist_error: PersistFailure::default(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_STATE_DIR),
            file_name: DEFAULT_STATE_FILE.to_string(),
            clear_existing: false,
        }
    }
}

impl MonitorConfig {
    /// Configuration for `root` with every other field defaulted
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check ranges and required fields
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::NoRoot);
        }
        if self.interval_secs == 0 {
            return Err(Error::InvalidInterval(self.interval_secs));
        }
        if self.state.enabled && self.state.file_name.trim().is_empty() {
            return Err(Error::Config("state file name is empty".into()));
        }
        Ok(())
    }

    /// Poll interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl StateConfig {
    /// State directory resolved against `root`
    pub fn resolve_dir(&self, root: &Path) -> PathBuf {
        if self.dir.is_absolute() {
            self.dir.clone()
        } else {
            root.join(&self.dir)
        }
    }
}

impl FromStr for PersistFailure {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "halt" => Ok(PersistFailure::Halt),
            "warn" => Ok(PersistFailure::Warn),
            other => Err(format!("unknown persist failure policy '{other}' (expected halt or warn)")),
        }
    }
}

impl fmt::Display for PersistFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistFailure::Halt => write!(f, "halt"),
            PersistFailure::Warn => write!(f, "warn"),
        }
    }
}
