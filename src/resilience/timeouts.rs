//! Deadline propagation.
//!
//! # Responsibilities
//! - Carry the caller's deadline through every suspension point
//! - Bound adapter calls and limiter waits by the remaining time
//!
//! # Design Decisions
//! - Uses Tokio's clock so paused-time tests drive it deterministically
//! - A deadline is a value, not a context; it is passed explicitly

use std::time::Duration;
use tokio::time::Instant;

/// Absolute point in time after which work must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// The earlier of this deadline and `timeout` from now.
    pub fn cap(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(capped) if capped < self.at => Self { at: capped },
            _ => *self,
        }
    }

    /// True if waiting `wait` from now would still finish before the deadline.
    pub fn allows_wait(&self, wait: Duration) -> bool {
        wait <= self.remaining()
    }
}
