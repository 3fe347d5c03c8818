//! Watchdog deadlines for the session state machine.
//!
//! A watchdog is a plain optional deadline owned by the controller. Disarming
//! it is just clearing the deadline, so a timer that would have fired after
//! the state moved on can never be observed.

use std::future;
use std::time::Duration;

use tokio::time::{self, Instant};

/// A cancellable deadline.
#[derive(Debug, Default, Clone, Copy)]
pub struct Watchdog {
    deadline: Option<Instant>,
    armed_for: Duration,
}

impl Watchdog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the countdown.
    pub fn arm(&mut self, duration: Duration) {
        self.deadline = Some(Instant::now() + duration);
        self.armed_for = duration;
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Duration passed to the most recent `arm`.
    #[inline]
    #[must_use]
    pub fn armed_for(&self) -> Duration {
        self.armed_for
    }
}

/// Complete at `deadline`, or never when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending::<()>().await,
    }
}
