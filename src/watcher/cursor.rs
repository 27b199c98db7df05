//! Per-file read cursors and the shared watch set.
//!
//! The map itself sits behind one `RwLock` that is only held for lookups and
//! inserts. Each tracked file carries its own `Mutex`, so tailing one file
//! never blocks registration or tailing of another.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::fs::File;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::error::WatcherError;
use super::rotation::FileIdentity;

/// Read state of a single tracked log file.
#[derive(Debug)]
pub struct TrackedFile {
    /// Absolute path, the identity of the entry.
    path: PathBuf,
    /// Byte offset up to which complete lines have been emitted.
    offset: u64,
    /// File size seen by the last stat.
    size: u64,
    /// Read handle kept open for the lifetime of the entry.
    handle: File,
    /// Identity of the file `handle` refers to.
    identity: FileIdentity,
}

impl TrackedFile {
    /// Open `path` and position the cursor at its current end.
    ///
    /// Content already present at discovery is never emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or stat'ed.
    pub async fn open(path: PathBuf) -> Result<Self, WatcherError> {
        let handle = File::open(&path)
            .await
            .map_err(|e| WatcherError::from_io(&path, e))?;
        let metadata = handle
            .metadata()
            .await
            .map_err(|e| WatcherError::from_io(&path, e))?;
        let size = metadata.len();

        Ok(Self {
            path,
            offset: size,
            size,
            handle,
            identity: FileIdentity::of(&metadata),
        })
    }

    /// Get the tracked path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the last observed file size.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Move the cursor to `new_offset` after a successful read.
    pub fn advance(&mut self, new_offset: u64) {
        self.offset = new_offset;
        self.size = self.size.max(new_offset);
    }

    /// Rewind the cursor to the start of the file after rotation.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    pub(crate) fn observe_size(&mut self, size: u64) {
        self.size = size;
    }

    pub(crate) fn handle_mut(&mut self) -> &mut File {
        &mut self.handle
    }

    pub(crate) fn identity(&self) -> FileIdentity {
        self.identity
    }

    pub(crate) fn replace_handle(&mut self, handle: File, identity: FileIdentity) {
        self.handle = handle;
        self.identity = identity;
    }
}

/// A watch set slot: the guarded file state plus a coalescing flag.
#[derive(Debug)]
pub struct TrackedEntry {
    /// Set while a tail pass is dispatched but has not started reading.
    queued: AtomicBool,
    file: Mutex<TrackedFile>,
}

impl TrackedEntry {
    fn new(file: TrackedFile) -> Self {
        Self {
            queued: AtomicBool::new(false),
            file: Mutex::new(file),
        }
    }

    /// Acquire exclusive access to the file state, waiting for any
    /// in-flight pass on the same path.
    pub async fn lock(&self) -> MutexGuard<'_, TrackedFile> {
        self.file.lock().await
    }

    /// Mark a pass as queued. Returns `false` if one was already waiting,
    /// in which case that pass will also cover the new data.
    pub(crate) fn try_queue(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    /// Clear the queued flag once a pass holds the lock and is about to read.
    pub(crate) fn start_pass(&self) {
        self.queued.store(false, Ordering::Release);
    }
}

/// Outcome of [`WatchSet::register`].
#[derive(Debug)]
pub enum Registration {
    /// The path was opened and inserted.
    Registered(Arc<TrackedEntry>),
    /// The path was already present; nothing changed.
    AlreadyTracked,
}

/// Shared mapping from tracked path to its cursor.
#[derive(Debug, Default)]
pub struct WatchSet {
    files: RwLock<HashMap<PathBuf, Arc<TrackedEntry>>>,
}

impl WatchSet {
    /// Create an empty watch set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `path` from its current end of file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or stat'ed. The set is
    /// left unchanged in that case.
    pub async fn register(&self, path: &Path) -> Result<Registration, WatcherError> {
        if self.contains(path).await {
            return Ok(Registration::AlreadyTracked);
        }

        // Open outside the map lock; a concurrent registration of the same
        // path is resolved by the entry check below.
        let file = TrackedFile::open(path.to_path_buf()).await?;

        let mut files = self.files.write().await;
        match files.entry(path.to_path_buf()) {
            Entry::Occupied(_) => Ok(Registration::AlreadyTracked),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    path = %path.display(),
                    offset = file.offset(),
                    "Tracking file from end"
                );
                let entry = Arc::new(TrackedEntry::new(file));
                slot.insert(Arc::clone(&entry));
                Ok(Registration::Registered(entry))
            }
        }
    }

    /// Look up the entry for `path`.
    pub async fn get(&self, path: &Path) -> Option<Arc<TrackedEntry>> {
        self.files.read().await.get(path).cloned()
    }

    /// Check whether `path` is tracked.
    pub async fn contains(&self, path: &Path) -> bool {
        self.files.read().await.contains_key(path)
    }

    /// Number of tracked files.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    /// Check whether nothing is tracked yet.
    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    /// Sorted list of tracked paths.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Move the cursor of `path` to `new_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::NotTracked`] if the path is unknown.
    pub async fn advance(&self, path: &Path, new_offset: u64) -> Result<(), WatcherError> {
        let entry = self
            .get(path)
            .await
            .ok_or_else(|| WatcherError::NotTracked(path.to_path_buf()))?;
        entry.lock().await.advance(new_offset);
        Ok(())
    }

    /// Rewind the cursor of `path` to byte 0.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::NotTracked`] if the path is unknown.
    pub async fn reset(&self, path: &Path) -> Result<(), WatcherError> {
        let entry = self
            .get(path)
            .await
            .ok_or_else(|| WatcherError::NotTracked(path.to_path_buf()))?;
        entry.lock().await.reset();
        Ok(())
    }
}
