//! Command-line arguments

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use pollmon_core::{MonitorConfig, PersistFailure};
use std::path::PathBuf;

/// pollmon - report files added, deleted and modified in a directory tree
#[derive(Parser, Debug)]
#[command(name = "pollmon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to monitor (default: current directory)
    #[arg(long = "dir", value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Poll interval in seconds (default: 3)
    #[arg(short = 'i', long = "interval", value_name = "SECS")]
    pub interval: Option<u64>,

    /// Clear existing state files before the first scan
    #[arg(short = 'c', long = "clear")]
    pub clear: bool,

    /// Enable or disable state file use (default: true)
    #[arg(short = 's', long = "state", value_name = "BOOL", action = ArgAction::Set)]
    pub state: Option<bool>,

    /// Disable state file use
    #[arg(long = "no-state", conflicts_with = "state")]
    pub no_state: bool,

    /// State directory, relative to the monitored directory (default: .pollmon)
    #[arg(short = 'd', long = "state-dir", value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// State file name (default: statefile)
    #[arg(short = 'n', long = "state-file", value_name = "NAME")]
    pub state_file: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// What to do when the state file cannot be written: halt or warn
    #[arg(long = "on-persist-error", value_name = "POLICY")]
    pub on_persist_error: Option<PersistFailure>,
}

impl Cli {
    /// Build the monitor configuration: file values first, then flags
    pub fn to_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => MonitorConfig::default(),
        };

        if let Some(dir) = &self.dir {
            config.root = dir.clone();
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if self.no_state {
            config.state.enabled = false;
        } else if let Some(enabled) = self.state {
            config.state.enabled = enabled;
        }
        if let Some(state_dir) = &self.state_dir {
            config.state.dir = state_dir.clone();
        }
        if let Some(name) = &self.state_file {
            config.state.file_name = name.clone();
        }
        if self.clear {
            config.state.clear_existing = true;
        }
        if let Some(policy) = self.on_persist_error {
            config.on_persist_error = policy;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
