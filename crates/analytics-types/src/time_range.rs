//! A half-open millisecond time range used throughout report aggregation.

use serde::{Deserialize, Serialize};

use crate::conversation::TimestampMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimestampMs,
    pub end: TimestampMs,
}

impl TimeRange {
    pub fn new(start: TimestampMs, end: TimestampMs) -> Self {
        Self { start, end }
    }

    /// An empty range (`end < start`) yields zeroed aggregates everywhere
    /// without failing — callers check this before running expensive SQL.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, ts: TimestampMs) -> bool {
        !self.is_empty() && ts >= self.start && ts <= self.end
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_when_end_before_start() {
        assert!(TimeRange::new(10, 5).is_empty());
        assert!(!TimeRange::new(5, 10).is_empty());
    }

    #[test]
    fn contains_is_inclusive_bounds() {
        let r = TimeRange::new(5, 10);
        assert!(r.contains(5));
        assert!(r.contains(10));
        assert!(!r.contains(4));
        assert!(!r.contains(11));
    }

    #[test]
    fn empty_range_contains_nothing() {
        let r = TimeRange::new(10, 5);
        assert!(!r.contains(7));
    }
}
