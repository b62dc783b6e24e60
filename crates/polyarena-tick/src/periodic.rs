//! Low-frequency maintenance timers (boundary checks, inactivity sweeps).
//!
//! These run on their own cadence, independent of message arrival and of
//! the simulation tick. Missed periods are never replayed: a sweep that
//! runs late simply runs once.

use std::time::Duration;

use tokio::time::{self, Instant};

/// A named timer that fires every `period`.
#[derive(Debug, Clone)]
pub struct Periodic {
    name: &'static str,
    period: Duration,
    next_due: Instant,
}

impl Periodic {
    /// Creates a timer whose first firing is one `period` after `now`.
    ///
    /// A zero period is bumped to one millisecond so the timer can't spin.
    pub fn new(name: &'static str, period: Duration, now: Instant) -> Self {
        let period = period.max(Duration::from_millis(1));
        Self {
            name,
            period,
            next_due: now + period,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Fires if due: returns `true` and schedules the next firing one
    /// period after `now`. Returns `false` otherwise.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.next_due = now + self.period;
        tracing::trace!(timer = self.name, "maintenance timer fired");
        true
    }

    /// Sleeps until the timer is due, fires it and returns the firing
    /// instant. Cancel-safe: dropping the future leaves the timer untouched.
    pub async fn tick(&mut self) -> Instant {
        time::sleep_until(self.next_due).await;
        let now = Instant::now();
        self.poll(now);
        now
    }
}
