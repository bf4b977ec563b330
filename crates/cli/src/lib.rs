//! pollmon command-line front end
//!
//! Parses flags (and an optional TOML file) into a monitor configuration,
//! takes the state-directory lock, prints changes to stdout and runs the
//! watch loop until Ctrl-C or a fatal error.

pub mod args;
pub mod locks;
pub mod output;

use anyhow::{Context, Result};
use pollmon_core::{check_root, resolve_state_dir};
use pollmon_watcher::Monitor;
use tracing::info;

pub use args::Cli;

/// Run the monitor described by `cli`
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.to_config()?;
    check_root(&config.root).context("Cannot monitor directory")?;

    // Held for the life of the loop
    let _lock = if config.state.enabled {
        let state_dir =
            resolve_state_dir(&config.root, &config.state).context("Invalid state directory")?;
        Some(locks::StateLock::acquire(&state_dir)?)
    } else {
        None
    };

    let monitor = Monitor::new(config, output::console_callbacks())
        .context("Failed to start monitor")?;

    tokio::select! {
        result = monitor.run() => result.context("Monitor stopped"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, exiting");
            Ok(())
        }
    }
}
