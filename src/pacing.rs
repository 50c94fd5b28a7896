//! Fixed-rate pacing
//!
//! Capture and sessions both run one cycle per frame interval. A cycle that
//! finishes early sleeps until its deadline; one that overran yields once
//! instead, so a busy task still lets others run.

use std::time::Duration;

use tokio::time::Instant;

/// Drift-free periodic pacer
#[derive(Debug)]
pub struct Pacer {
    period: Duration,
    deadline: Instant,
    missed: u64,
}

impl Pacer {
    /// Start pacing now with the given period
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: Instant::now() + period,
            missed: 0,
        }
    }

    /// Cycle period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadlines missed so far
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Re-anchor the schedule at the current instant
    pub fn reset(&mut self) {
        self.deadline = Instant::now() + self.period;
    }

    /// Wait for the end of the current cycle.
    ///
    /// Returns `false` if the deadline had already passed. Deadlines advance
    /// by whole periods so the rate does not drift; after an overrun of more
    /// than a full period the schedule is re-anchored rather than replaying
    /// the missed cycles back to back.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now < self.deadline {
            tokio::time::sleep_until(self.deadline).await;
            self.deadline += self.period;
            return true;
        }

        self.missed += 1;
        self.deadline += self.period;
        if self.deadline <= now {
            self.deadline = now + self.period;
        }
        tokio::task::yield_now().await;
        false
    }
}
