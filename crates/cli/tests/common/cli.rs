//! CLI command execution helpers
//!
//! Wraps the `pollmon` binary. Short-lived invocations (bad flags, missing
//! root) run to completion; a watching monitor is spawned and its stdout
//! read line by line until the test kills it.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

/// CLI command builder
pub struct PollmonCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
}

impl PollmonCommand {
    /// Create a new command in the given working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_pollmon")),
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command.args(&self.args).current_dir(&self.working_dir);
        command
    }

    /// Execute command to completion
    pub fn execute(&self) -> Result<CommandResult> {
        let output = self
            .command()
            .output()
            .context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }

    /// Start a long-running monitor
    pub fn spawn(&self) -> Result<RunningMonitor> {
        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn command")?;

        let stdout = child.stdout.take().context("No stdout")?;
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(RunningMonitor { child, lines: rx })
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// A monitor process whose stdout is being collected
pub struct RunningMonitor {
    child: Child,
    lines: Receiver<String>,
}

impl RunningMonitor {
    /// Wait for the next stdout line
    pub fn next_line(&self, timeout: Duration) -> Result<String> {
        self.lines
            .recv_timeout(timeout)
            .context("Timed out waiting for monitor output")
    }

    /// Collect lines until `expected` have arrived
    pub fn lines(&self, expected: usize, timeout: Duration) -> Result<Vec<String>> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::with_capacity(expected);
        while out.len() < expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            out.push(self.next_line(remaining)?);
        }
        Ok(out)
    }

    /// Stop the process
    pub fn kill(mut self) -> Result<()> {
        self.child.kill().context("Failed to kill monitor")?;
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for RunningMonitor {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// pollmon!(dir, "--dir", "missing").assert_failure()?;
/// ```
#[macro_export]
macro_rules! pollmon {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::PollmonCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
