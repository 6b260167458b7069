// crates/analytics-db/src/queries/mod.rs
//! One `impl Database` block per repository concern, re-exported here.

pub mod conversation_analytics;
pub mod decision_tracking;
pub mod knowledge_gaps;
pub mod productivity_patterns;
