// crates/analytics-core/src/deadline.rs
//! A plain `Instant`-based deadline threaded explicitly through batch
//! call graphs. Never wraps a transaction in `tokio::time::timeout` —
//! a started chunk always completes or rolls back as a unit; cancellation
//! is only ever checked between items.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline: `expired` is always false.
    pub fn none() -> Self {
        Self(None)
    }

    /// An already-elapsed deadline: `expired` is always true. Used for
    /// `max_processing_time_ms = 0`, which must return immediately with
    /// `processed = 0` rather than running unbounded.
    pub fn elapsed() -> Self {
        Self(Some(Instant::now() - Duration::from_millis(1)))
    }

    /// `millis == 0` is the caller's "cancel before starting" sentinel,
    /// not "no deadline" — see `elapsed`.
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            Self::elapsed()
        } else {
            Self(Some(Instant::now() + Duration::from_millis(millis)))
        }
    }

    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}
