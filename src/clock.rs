//! Monotonic time sources for the frame driver.
//!
//! Input events are stamped with `Clock::now()` when they arrive, and the
//! idle debounce is measured against the same clock, so tests can drive
//! timing deterministically with [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use web_time::Instant;

pub trait Clock {
    /// Time elapsed since the clock was created. Never decreases.
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Hand-advanced clock. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
