// crates/analytics-core/src/incremental.rs
//! The incremental-scan predicate: a conversation needs (re-)analysis
//! when it has never been analyzed, or when it changed after its last
//! analysis pass. Pure so it can be tested without a database.

use analytics_types::TimestampMs;

pub fn needs_analysis(analyzed_at: Option<TimestampMs>, updated_at: TimestampMs) -> bool {
    match analyzed_at {
        None => true,
        Some(analyzed) => analyzed < updated_at,
    }
}
