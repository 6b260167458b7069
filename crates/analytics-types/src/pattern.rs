//! `ProductivityPattern`: a summary over a fixed-length time window.

use crate::conversation::TimestampMs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Hour,
    Day,
    Week,
    Month,
}

impl WindowType {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowType::Hour => "hour",
            WindowType::Day => "day",
            WindowType::Week => "week",
            WindowType::Month => "month",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hour" => Some(WindowType::Hour),
            "day" => Some(WindowType::Day),
            "week" => Some(WindowType::Week),
            "month" => Some(WindowType::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityPattern {
    pub id: Option<String>,
    pub window_start: TimestampMs,
    pub window_end: TimestampMs,
    pub window_type: WindowType,
    pub conversation_count: u32,
    pub message_count: u32,
    pub decision_count: u32,
    pub insight_count: u32,
    pub avg_productivity: f64,
    pub peak_productivity: f64,
    pub min_productivity: f64,
    pub peak_hours: BTreeSet<u8>,
    pub optimal_session_length: u32,
    pub sample_size: u32,
    pub confidence_level: f64,
}

impl ProductivityPattern {
    /// Structural invariant: `window_end > window_start`.
    pub fn is_well_formed(&self) -> bool {
        self.window_end > self.window_start
            && self.sample_size >= 1
            && (0.0..=1.0).contains(&self.confidence_level)
            && self.peak_hours.iter().all(|h| *h < 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_type_round_trips_through_strings() {
        for wt in [WindowType::Hour, WindowType::Day, WindowType::Week, WindowType::Month] {
            assert_eq!(WindowType::parse(wt.as_str()), Some(wt));
        }
    }

    #[test]
    fn rejects_unknown_window_type() {
        assert_eq!(WindowType::parse("fortnight"), None);
    }
}
