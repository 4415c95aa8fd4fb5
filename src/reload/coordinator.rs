//! The build loop.
//!
//! ```text
//! Idle ──change──▶ Debouncing ──quiet window──▶ Building ──ok──▶ Publishing ──▶ Idle
//!   │                  │                           │
//!   └──shutdown──▶ Shutdown ◀──────────────────────┘ (failed builds return to Idle)
//! ```
//!
//! Exactly one thread runs [`BuildLoop::run`], so builds never overlap. No
//! lock is held while the build callback runs.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::epoch::{Epoch, EpochClock};
use super::gate::EpochGate;
use super::signal::RebuildSignal;
use crate::{debug, log, logger};

/// Full-site build, invoked synchronously. Never called concurrently with itself.
pub type Builder = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Quiet period a burst of changes must settle for before rebuilding.
pub const DEFAULT_BUILD_DELAY: Duration = Duration::from_millis(100);

/// Idle wake-up granularity; bounds how long shutdown takes to be noticed.
pub const DEFAULT_SHUTDOWN_DELAY: Duration = Duration::from_millis(250);

pub struct BuildLoop {
    builder: Builder,
    signal: Arc<RebuildSignal>,
    gate: Arc<EpochGate>,
    clock: Arc<EpochClock>,
    build_delay: Duration,
    shutdown_delay: Duration,
}

impl BuildLoop {
    pub fn new(
        builder: Builder,
        signal: Arc<RebuildSignal>,
        gate: Arc<EpochGate>,
        clock: Arc<EpochClock>,
    ) -> Self {
        Self {
            builder,
            signal,
            gate,
            clock,
            build_delay: DEFAULT_BUILD_DELAY,
            shutdown_delay: DEFAULT_SHUTDOWN_DELAY,
        }
    }

    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn with_shutdown_delay(mut self, delay: Duration) -> Self {
        self.shutdown_delay = delay;
        self
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("build-loop".into())
            .spawn(move || self.run())
    }

    /// Loop until shutdown is requested.
    pub fn run(&self) {
        while let Some(wanted) = self.next_rebuild() {
            debug!("build"; "rebuilding epoch {}", wanted);

            if let Err(message) = self.build() {
                log!("error"; "rebuild failed, still serving the last successful build");
                logger::status_error("rebuild failed", &message);
                self.gate.abandon();
                continue;
            }

            let visible = self.gate.publish();
            log!("serve"; "reloading browsers");
            logger::status_success(&format!("rebuilt (epoch {visible})"));

            let stats = self.signal.stats();
            debug_assert!(
                stats.rebuilds <= stats.changes_observed,
                "more rebuilds than file changes"
            );
        }
        debug!("build"; "build loop stopped");
    }

    /// Idle, then debounce. Returns the epoch to build, or `None` on shutdown.
    fn next_rebuild(&self) -> Option<Epoch> {
        let mut state = self.signal.lock();

        // Idle: wake periodically so shutdown is noticed promptly.
        while !(state.want_rebuild || state.shutdown) {
            self.signal.wait(&mut state, self.shutdown_delay);
        }
        if state.shutdown {
            return None;
        }

        log!("watch"; "detected file changes");

        // Debouncing: restart the window while changes keep arriving.
        loop {
            let seen = state.changes_observed;
            let timed_out = self.signal.wait(&mut state, self.build_delay);
            if state.shutdown {
                return None;
            }
            if timed_out && state.changes_observed == seen {
                break;
            }
            debug!("watch"; "waiting for file changes to stop happening");
        }

        let wanted = self.clock.next();
        self.gate.begin(wanted);
        state.want_rebuild = false;
        state.rebuilds += 1;
        Some(wanted)
    }

    /// Invoke the builder, turning errors and panics into a message.
    fn build(&self) -> Result<(), String> {
        match catch_unwind(AssertUnwindSafe(|| (self.builder)())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("build panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("build panicked: {s}")
    } else {
        "build panicked".to_string()
    }
}
