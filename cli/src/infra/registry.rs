//! Infrastructure implementation of the `PortRegistry` port.
//!
//! `FilePortRegistry` keeps the snapshot in `<state_dir>/ports.tsv` and
//! serializes every mutation across processes with an advisory exclusive lock
//! on the sibling `ports.lock`. Blocking lock and file I/O run under
//! `tokio::task::spawn_blocking`.

use std::fs::{File, OpenOptions};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fs2::FileExt;

use crate::application::ports::{PortProbe, PortRegistry};
use crate::domain::registry::{
    Snapshot, holder_of, parse_snapshot, render_snapshot, select_port, validate_key,
};

pub const REGISTRY_FILE: &str = "ports.tsv";
pub const LOCK_FILE: &str = "ports.lock";

/// File-backed port registry, safe to share between processes.
#[derive(Clone)]
pub struct FilePortRegistry {
    path: PathBuf,
    lock_path: PathBuf,
    probe: Arc<dyn PortProbe>,
    dry_run: bool,
}

/// Held for the duration of one critical section; unlocks on drop.
struct RegistryLock {
    file: File,
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "failed to release registry lock");
        }
    }
}

impl FilePortRegistry {
    /// Registry stored under `state_dir`, probing liveness with `probe`.
    #[must_use]
    pub fn new(state_dir: &Path, probe: Arc<dyn PortProbe>, dry_run: bool) -> Self {
        Self {
            path: state_dir.join(REGISTRY_FILE),
            lock_path: state_dir.join(LOCK_FILE),
            probe,
            dry_run,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<RegistryLock> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .with_context(|| format!("opening lock file {}", self.lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("locking {}", self.lock_path.display()))?;
        Ok(RegistryLock { file })
    }

    fn load_sync(&self) -> Result<Snapshot> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(parse_snapshot(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::new()),
            Err(e) => {
                Err(e).with_context(|| format!("reading port registry {}", self.path.display()))
            }
        }
    }

    /// Atomic write via temp file then rename.
    fn save_sync(&self, snapshot: &Snapshot) -> Result<()> {
        let temp_path = self.path.with_extension("tsv.tmp");
        std::fs::write(&temp_path, render_snapshot(snapshot))
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("finalizing port registry {}", self.path.display()))?;
        Ok(())
    }

    /// Run `mutate` inside the critical section and persist the result.
    fn transact<T>(&self, mutate: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        if self.dry_run {
            let mut snapshot = self.load_sync()?;
            return mutate(&mut snapshot);
        }
        let _guard = self.lock()?;
        let mut snapshot = self.load_sync()?;
        let before = snapshot.clone();
        let value = mutate(&mut snapshot)?;
        if snapshot != before {
            self.save_sync(&snapshot)?;
        }
        Ok(value)
    }

    /// Synchronous allocate, used by `allocate` via `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegistryKey` for a key the snapshot cannot hold,
    /// `ResourceExhausted` when the range has no free port, or an I/O error
    /// from the lock or the snapshot file.
    pub fn allocate_sync(&self, key: &str, range: RangeInclusive<u16>) -> Result<u16> {
        validate_key(key)?;
        self.transact(|snapshot| {
            let port = select_port(snapshot, key, range, |p| self.probe.is_listening(p))?;
            if snapshot.insert(key.to_string(), port).is_none() {
                tracing::info!(key, port, "port allocated");
            }
            Ok(port)
        })
    }

    /// Synchronous register, used by `register` via `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegistryKey` for a key the snapshot cannot hold, or an
    /// I/O error from the lock or the snapshot file.
    pub fn register_sync(&self, key: &str, port: u16) -> Result<u16> {
        validate_key(key)?;
        self.transact(|snapshot| {
            if let Some(holder) = holder_of(snapshot, port, key) {
                tracing::warn!(key, port, holder, "port already registered to another key");
            }
            snapshot.insert(key.to_string(), port);
            Ok(port)
        })
    }

    /// Synchronous remove, used by `remove` via `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the lock or the snapshot file.
    pub fn remove_sync(&self, key: &str) -> Result<Option<u16>> {
        self.transact(|snapshot| Ok(snapshot.remove(key)))
    }

    /// Unlocked read of the full snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot file exists but cannot be read.
    pub fn entries_sync(&self) -> Result<Snapshot> {
        self.load_sync()
    }
}

impl PortRegistry for FilePortRegistry {
    async fn allocate(&self, key: &str, range: RangeInclusive<u16>) -> Result<u16> {
        let this = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || this.allocate_sync(&key, range))
            .await
            .context("registry allocate task panicked")?
    }

    async fn register(&self, key: &str, port: u16) -> Result<u16> {
        let this = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || this.register_sync(&key, port))
            .await
            .context("registry register task panicked")?
    }

    async fn get(&self, key: &str) -> Result<Option<u16>> {
        Ok(self.entries().await?.get(key).copied())
    }

    async fn remove(&self, key: &str) -> Result<Option<u16>> {
        let this = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || this.remove_sync(&key))
            .await
            .context("registry remove task panicked")?
    }

    async fn entries(&self) -> Result<Snapshot> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.entries_sync())
            .await
            .context("registry read task panicked")?
    }
}
