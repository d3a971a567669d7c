//! Logical clock driven by liveness ticks.
//!
//! The clock counts ticks modulo [`CLOCK_WRAP`]. Ages are computed in the
//! same modular arithmetic, so a contact stamped just before the wrap and
//! read just after it still has a small age. Any disconnect threshold below
//! `CLOCK_WRAP` is therefore immune to the wrap.

/// Ticks after which the clock returns to zero.
pub const CLOCK_WRAP: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalClock {
    now: u64,
}

impl LogicalClock {
    pub fn new() -> Self {
        LogicalClock { now: 0 }
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Advance by one tick, wrapping at `CLOCK_WRAP`.
    pub fn advance(&mut self) -> u64 {
        self.now = (self.now + 1) % CLOCK_WRAP;
        self.now
    }

    /// Ticks elapsed since `stamp` (a value previously read from `now`).
    pub fn age(&self, stamp: u64) -> u64 {
        (self.now + CLOCK_WRAP - stamp % CLOCK_WRAP) % CLOCK_WRAP
    }
}
