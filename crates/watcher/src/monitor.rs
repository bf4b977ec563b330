//! Watch loop
//!
//! Loads the last persisted snapshot once, then repeats
//! scan -> compare -> persist -> sleep until a fatal error.
//! Persistence of a cycle always follows its comparison, so a crash in
//! between re-reports the same changes on restart.

use crate::callbacks::Callbacks;
use crate::diff::{compare, ChangeSet};
use pollmon_core::{
    build_snapshot_excluding, check_root, Error, ErrorKind, MonitorConfig, PersistFailure, Result,
    ScratchAllocator, Snapshot, SnapshotStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

/// Periodic scanner for one directory tree
///
/// Cheap to clone; clones share configuration, store and callbacks.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

struct Inner {
    config: MonitorConfig,
    store: SnapshotStore,
    callbacks: Callbacks,
    /// State directory and lock file, when they live inside the root
    excluded: Vec<PathBuf>,
}

impl Monitor {
    /// Create a monitor using the system temp directory for scratch files
    pub fn new(config: MonitorConfig, callbacks: Callbacks) -> Result<Self> {
        Self::with_scratch(config, callbacks, ScratchAllocator::system())
    }

    /// Create a monitor with an explicit scratch allocator
    ///
    /// Validates the configuration, checks the root and opens (and
    /// optionally clears) the state store.
    pub fn with_scratch(
        config: MonitorConfig,
        callbacks: Callbacks,
        scratch: ScratchAllocator,
    ) -> Result<Self> {
        config.validate()?;
        check_root(&config.root)?;
        let store = SnapshotStore::open(&config.root, &config.state, scratch)?;
        let excluded = store.paths_within(&config.root);
        if !excluded.is_empty() {
            debug!("Excluding state paths from scans: {:?}", excluded);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                callbacks,
                excluded,
            }),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Snapshot store
    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    /// Load the snapshot the previous run left behind
    pub fn load_previous(&self) -> Result<Snapshot> {
        self.inner.store.load()
    }

    /// Run one scan -> compare -> persist cycle against `previous`
    ///
    /// Returns the fresh snapshot, which becomes `previous` for the next
    /// cycle.
    pub fn cycle(&self, previous: &Snapshot) -> Result<Snapshot> {
        let current = build_snapshot_excluding(&self.inner.config.root, &self.inner.excluded)?;

        if tracing::enabled!(Level::DEBUG) {
            let changes = ChangeSet::between(previous, &current);
            debug!(
                files = current.len(),
                added = changes.added.len(),
                deleted = changes.deleted.len(),
                modified = changes.modified.len(),
                "Scan complete"
            );
        }

        compare(previous, &current, &self.inner.callbacks);
        self.persist(&current)?;

        Ok(current)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        match self.inner.store.persist(snapshot) {
            Ok(()) => Ok(()),
            Err(e)
                if e.kind() == ErrorKind::Persistence
                    && self.inner.config.on_persist_error == PersistFailure::Warn =>
            {
                warn!("{}; will retry next cycle", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run the watch loop until a fatal error
    ///
    /// Blocking work runs on tokio's blocking pool; the only suspension
    /// points are those calls and the sleep between cycles.
    pub async fn run(self) -> Result<()> {
        let interval = self.inner.config.interval();

        info!(
            "Watching {} every {:?}",
            self.inner.config.root.display(),
            interval
        );
        match self.inner.store.state_file() {
            Some(path) => info!("State file: {}", path.display()),
            None => info!("State persistence disabled"),
        }

        let monitor = self.clone();
        let mut previous = blocking(move || monitor.load_previous()).await?;
        debug!("Starting from {} known files", previous.len());

        loop {
            let monitor = self.clone();
            previous = blocking(move || monitor.cycle(&previous)).await?;
            tokio::time::sleep(interval).await;
        }
    }
}

/// Run `f` on the blocking pool, resuming any panic on this task
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(Error::Io(std::io::Error::other(e))),
    }
}
