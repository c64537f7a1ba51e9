//! Time sources.
//!
//! The registry never calls `Instant::now()` directly; it asks a [`Clock`].
//! Production code uses [`SystemClock`], tests drive a [`ManualClock`].

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// The instant this clock started at ("t = 0").
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Instant at `offset` past the origin.
    pub fn at(&self, offset: Duration) -> Instant {
        self.origin + offset
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Jump to `offset` past the origin. Moving backwards is allowed.
    pub fn set(&self, offset: Duration) {
        *self.offset.lock() = offset;
    }

    /// Time elapsed since the origin.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}
