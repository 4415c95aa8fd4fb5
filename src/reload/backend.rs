//! `notify`-based watch backend.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind};
use notify::{Config, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;

use super::watch::{ChangeEvent, ChangeHandler, WatchBackend, WatchHandle};

/// How the filesystem is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherKind {
    /// Platform notification API (inotify, FSEvents, ...).
    Native,
    /// Periodic scanning; works on network mounts and in containers.
    Poll(Duration),
}

enum AnyWatcher {
    Native(RecommendedWatcher),
    Poll(PollWatcher),
}

impl AnyWatcher {
    fn watch(&mut self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
        match self {
            Self::Native(w) => w.watch(path, mode),
            Self::Poll(w) => w.watch(path, mode),
        }
    }
}

pub struct NotifyBackend {
    kind: WatcherKind,
    next_id: u64,
    /// Dropping a watcher cancels its subscription and joins its thread.
    watchers: FxHashMap<WatchHandle, AnyWatcher>,
}

impl NotifyBackend {
    pub fn new(kind: WatcherKind) -> Self {
        Self {
            kind,
            next_id: 0,
            watchers: FxHashMap::default(),
        }
    }
}

impl WatchBackend for NotifyBackend {
    fn schedule(
        &mut self,
        path: &Path,
        recursive: bool,
        handler: ChangeHandler,
    ) -> Result<WatchHandle> {
        let kind = self.kind;
        let callback = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if let Some(change) = to_change_event(event, kind) {
                    handler(&change);
                }
            }
            Err(e) => crate::log!("watch"; "notify error: {}", e),
        };

        let mut watcher = match self.kind {
            WatcherKind::Native => AnyWatcher::Native(
                notify::recommended_watcher(callback).context("failed to create watcher")?,
            ),
            WatcherKind::Poll(interval) => {
                // mtime has one-second resolution here; hashing catches quicker edits
                let config = Config::default()
                    .with_poll_interval(interval)
                    .with_compare_contents(true);
                AnyWatcher::Poll(
                    PollWatcher::new(callback, config)
                        .context("failed to create polling watcher")?,
                )
            }
        };

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(path, mode)
            .with_context(|| format!("failed to watch {}", path.display()))?;

        self.next_id += 1;
        let handle = WatchHandle::new(self.next_id);
        self.watchers.insert(handle, watcher);
        Ok(handle)
    }

    fn unschedule(&mut self, handle: WatchHandle) -> Result<()> {
        self.watchers
            .remove(&handle)
            .map(drop)
            .ok_or_else(|| anyhow::anyhow!("unknown watch handle {:?}", handle))
    }

    fn stop(&mut self) {
        self.watchers.clear();
    }
}

/// Translate a raw notify event, dropping noise that never warrants a rebuild.
///
/// The polling watcher reports a content edit as a write-time change, so
/// those only count as noise for native watchers.
fn to_change_event(event: notify::Event, source: WatcherKind) -> Option<ChangeEvent> {
    let is_directory = match event.kind {
        EventKind::Access(_) => return None,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime | MetadataKind::Any))
            if matches!(source, WatcherKind::Poll(_)) =>
        {
            !event.paths.is_empty() && event.paths.iter().all(|p| p.is_dir())
        }
        // atime/chmod churn can cause endless rebuild loops
        EventKind::Modify(ModifyKind::Metadata(_)) => return None,
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => true,
        _ => !event.paths.is_empty() && event.paths.iter().all(|p| p.is_dir()),
    };

    Some(ChangeEvent {
        paths: event.paths,
        is_directory,
    })
}
