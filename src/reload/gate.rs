//! Epoch visibility gate.
//!
//! Request handlers take this lock only to read or to wait; the build loop
//! takes it only to record a new wanted epoch and to publish.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::epoch::Epoch;

#[derive(Debug, Clone, Copy)]
struct Epochs {
    /// Last fully built version of the site.
    visible: Epoch,
    /// Version that started building most recently.
    wanted: Epoch,
}

pub struct EpochGate {
    state: Mutex<Epochs>,
    cond: Condvar,
}

impl EpochGate {
    pub fn new(initial: Epoch) -> Self {
        Self {
            state: Mutex::new(Epochs {
                visible: initial,
                wanted: initial,
            }),
            cond: Condvar::new(),
        }
    }

    /// `(visible, wanted)` at this instant.
    pub fn snapshot(&self) -> (Epoch, Epoch) {
        let state = self.state.lock();
        (state.visible, state.wanted)
    }

    pub fn visible(&self) -> Epoch {
        self.state.lock().visible
    }

    /// Mark a build generation as in flight.
    pub fn begin(&self, wanted: Epoch) {
        let mut state = self.state.lock();
        debug_assert!(wanted >= state.wanted, "wanted epoch went backwards");
        state.wanted = wanted;
    }

    /// Make the in-flight generation visible and wake every waiter.
    pub fn publish(&self) -> Epoch {
        let mut state = self.state.lock();
        state.visible = state.wanted;
        self.cond.notify_all();
        state.visible
    }

    /// Drop the in-flight generation after a failed build.
    ///
    /// The visible epoch stays where it was; file requests resume serving it.
    pub fn abandon(&self) {
        let mut state = self.state.lock();
        state.wanted = state.visible;
        self.cond.notify_all();
    }

    /// Block until no build is in flight. Returns the visible epoch.
    pub fn wait_converged(&self) -> Epoch {
        let mut state = self.state.lock();
        self.cond.wait_while(&mut state, |s| s.visible != s.wanted);
        state.visible
    }

    /// Block until the visible epoch passes `epoch` or `timeout` elapses.
    ///
    /// Returns the visible epoch at wake-up, which equals the old one on timeout.
    pub fn wait_newer_than(&self, epoch: Epoch, timeout: Duration) -> Epoch {
        let mut state = self.state.lock();
        if state.visible <= epoch {
            self.cond
                .wait_while_for(&mut state, |s| s.visible <= epoch, timeout);
        }
        state.visible
    }
}
