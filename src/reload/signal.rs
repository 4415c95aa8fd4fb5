//! Rebuild request flag shared between watch callbacks and the build loop.

use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

/// Counters kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// File-level change notifications received.
    pub changes_observed: u64,
    /// Rebuilds the build loop started.
    pub rebuilds: u64,
}

#[derive(Debug, Default)]
pub(super) struct RebuildState {
    pub(super) want_rebuild: bool,
    pub(super) changes_observed: u64,
    pub(super) rebuilds: u64,
    pub(super) shutdown: bool,
}

#[derive(Default)]
pub struct RebuildSignal {
    state: Mutex<RebuildState>,
    cond: Condvar,
}

impl RebuildSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file change. Changes are not queued: a burst collapses into
    /// one pending rebuild.
    pub fn notify_change(&self) {
        let mut state = self.state.lock();
        state.want_rebuild = true;
        state.changes_observed += 1;
        self.cond.notify_all();
    }

    /// Enter the terminal state and wake the build loop.
    pub fn request_shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.cond.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn stats(&self) -> BuildStats {
        let state = self.state.lock();
        BuildStats {
            changes_observed: state.changes_observed,
            rebuilds: state.rebuilds,
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, RebuildState> {
        self.state.lock()
    }

    /// Wait for a notification or the timeout. Returns `true` on timeout.
    pub(super) fn wait(&self, guard: &mut MutexGuard<'_, RebuildState>, timeout: Duration) -> bool {
        self.cond.wait_for(guard, timeout).timed_out()
    }
}
