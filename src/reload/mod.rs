//! Rebuild coordination for the live-reload server.
//!
//! # Architecture
//!
//! ```text
//! WatchBackend ──▶ WatchRegistry ──▶ RebuildSignal ──▶ BuildLoop ──▶ EpochGate ◀── request threads
//!  (notify)        (refcounted)      (flag + counters)  (debounce,     (visible /
//!                                                         build)        wanted)
//! ```
//!
//! Shared state lives behind exactly two condition variables: the
//! [`RebuildSignal`] (watch callbacks write, build loop reads) and the
//! [`EpochGate`] (build loop writes, request handlers read or wait).
//!
//! # Modules
//!
//! - `epoch` - Build generation stamps and their clock
//! - `gate` - Visible/wanted epoch pair and waits on it
//! - `signal` - Rebuild request flag, counters, shutdown flag
//! - `watch` - Reference-counted watch registry and backend trait
//! - `backend` - `notify` implementation of the backend
//! - `coordinator` - The build loop

mod backend;
mod coordinator;
mod epoch;
mod gate;
mod signal;
mod watch;

pub use backend::{NotifyBackend, WatcherKind};
pub use coordinator::{BuildLoop, Builder, DEFAULT_BUILD_DELAY, DEFAULT_SHUTDOWN_DELAY};
pub use epoch::{Epoch, EpochClock};
pub use gate::EpochGate;
pub use signal::{BuildStats, RebuildSignal};
pub use watch::{ChangeEvent, ChangeHandler, WatchBackend, WatchError, WatchHandle, WatchRegistry};

#[cfg(test)]
pub(crate) use watch::testing;
