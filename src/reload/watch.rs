//! Reference-counted registry of watched paths.
//!
//! Several collaborators may ask for the same path. The underlying
//! subscription is created on the first `watch` and cancelled on the last
//! `unwatch`, so overlapping requests neither double the event stream nor
//! unsubscribe a path someone still needs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::signal::RebuildSignal;
use crate::utils::path::absolutize;

/// Opaque subscription token issued by a [`WatchBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

impl WatchHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// A filesystem change delivered by a backend.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub paths: Vec<PathBuf>,
    pub is_directory: bool,
}

impl ChangeEvent {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            is_directory: false,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            is_directory: true,
        }
    }
}

/// Callback a backend invokes for every change under a scheduled path.
pub type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Filesystem observation subsystem.
pub trait WatchBackend: Send {
    fn schedule(
        &mut self,
        path: &Path,
        recursive: bool,
        handler: ChangeHandler,
    ) -> anyhow::Result<WatchHandle>;

    fn unschedule(&mut self, handle: WatchHandle) -> anyhow::Result<()>;

    /// Cancel every subscription and release the observer threads.
    fn stop(&mut self);
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("`{0}` is not being watched")]
    NotWatched(PathBuf),

    #[error("failed to watch `{0}`")]
    Schedule(PathBuf, #[source] anyhow::Error),

    #[error("failed to stop watching `{0}`")]
    Unschedule(PathBuf, #[source] anyhow::Error),
}

struct Entry {
    count: usize,
    handle: WatchHandle,
}

struct Inner {
    entries: FxHashMap<PathBuf, Entry>,
    backend: Box<dyn WatchBackend>,
}

pub struct WatchRegistry {
    inner: Mutex<Inner>,
    signal: Arc<RebuildSignal>,
}

impl WatchRegistry {
    pub fn new(backend: Box<dyn WatchBackend>, signal: Arc<RebuildSignal>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: FxHashMap::default(),
                backend,
            }),
            signal,
        }
    }

    /// Watch `path`, rebuilding when any file under it changes.
    pub fn watch(&self, path: &Path, recursive: bool) -> Result<(), WatchError> {
        let path = absolutize(path);
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get_mut(&path) {
            entry.count += 1;
            return Ok(());
        }

        let signal = Arc::clone(&self.signal);
        let handler: ChangeHandler = Arc::new(move |event: &ChangeEvent| {
            if event.is_directory {
                return;
            }
            crate::debug!("watch"; "change: {:?}", event.paths);
            signal.notify_change();
        });

        crate::debug!("watch"; "watching '{}'", path.display());
        let handle = inner
            .backend
            .schedule(&path, recursive, handler)
            .map_err(|e| WatchError::Schedule(path.clone(), e))?;
        inner.entries.insert(path, Entry { count: 1, handle });
        Ok(())
    }

    /// Release one `watch` of `path`.
    ///
    /// Fails with [`WatchError::NotWatched`] when there is no matching
    /// `watch` call left to balance.
    pub fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        let path = absolutize(path);
        let mut inner = self.inner.lock();

        let Some(entry) = inner.entries.get_mut(&path) else {
            return Err(WatchError::NotWatched(path));
        };

        entry.count -= 1;
        if entry.count > 0 {
            return Ok(());
        }

        let handle = entry.handle;
        inner.entries.remove(&path);
        crate::debug!("watch"; "unwatching '{}'", path.display());
        inner
            .backend
            .unschedule(handle)
            .map_err(|e| WatchError::Unschedule(path, e))
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.inner.lock().entries.contains_key(&absolutize(path))
    }

    /// Number of outstanding `watch` calls for `path`.
    pub fn ref_count(&self, path: &Path) -> usize {
        self.inner
            .lock()
            .entries
            .get(&absolutize(path))
            .map_or(0, |e| e.count)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Watched paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.inner.lock().entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Stop observing. Registrations are kept so callers can still ask
    /// whether live reload was active.
    pub fn stop(&self) {
        self.inner.lock().backend.stop();
    }
}
