//! Exponential backoff for the spin phase of blocking waits.

use std::hint::spin_loop;
use std::thread;

/// Spin-then-yield backoff.
///
/// The first [`Backoff::SPIN_LIMIT`] steps busy-spin with exponentially
/// growing bursts, later steps yield the time slice. Once `limit` steps have
/// been taken the backoff reports [`is_completed`](Backoff::is_completed)
/// and the caller is expected to block on something real.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    limit: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const DEFAULT_LIMIT: u32 = 10;

    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(limit: u32) -> Self {
        Self { step: 0, limit }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Perform one step of backoff.
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else {
            thread::yield_now();
        }

        if self.step <= self.limit {
            self.step += 1;
        }
    }

    pub fn is_completed(&self) -> bool {
        self.step >= self.limit
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
