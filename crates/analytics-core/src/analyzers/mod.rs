// crates/analytics-core/src/analyzers/mod.rs
//! The four pure analyzers (C6-C9), each a stateless struct
//! implementing `Analyzer`.

mod decision_tracker;
mod flow;
mod gap_detector;
mod productivity;

pub use decision_tracker::DecisionTracker;
pub use flow::{FlowAnalyzer, FlowMetrics};
pub use gap_detector::KnowledgeGapDetector;
pub use productivity::{ProductivityAnalyzer, ProductivityMetrics};
