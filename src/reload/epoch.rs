//! Build generation stamps.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Version of the built site, in milliseconds.
///
/// Only the ordering between two epochs carries meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic millisecond source anchored to wall-clock time.
///
/// The wall-clock anchor keeps epochs increasing across server restarts, so a
/// browser tab left open from a previous run still reloads after the next
/// successful build.
pub struct EpochClock {
    origin: Instant,
    origin_ms: u64,
    last: AtomicU64,
}

impl EpochClock {
    pub fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            origin_ms,
            last: AtomicU64::new(0),
        }
    }

    /// Current time in epoch units. Non-decreasing.
    pub fn now(&self) -> Epoch {
        Epoch(self.origin_ms + self.origin.elapsed().as_millis() as u64)
    }

    /// A fresh epoch strictly greater than any previously returned by `next`.
    pub fn next(&self) -> Epoch {
        let now = self.now().0;
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Epoch(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for EpochClock {
    fn default() -> Self {
        Self::new()
    }
}
