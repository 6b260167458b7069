// crates/analytics-engine/src/lib.rs
//! Orchestration layer for the conversation analytics engine: wires the
//! pure analyzers (`analytics-core`) to the repositories
//! (`analytics-db`) behind one `AnalyticsEngine`, plus the phased batch
//! pipeline (`BatchProcessor`) for large-scale backfills.

pub mod batch_processor;
pub mod cache;
pub mod engine;
pub mod report;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch_processor::{AnalysisType, BatchProcessOptions, BatchProcessor, BatchRunOutcome, Phase, ProgressEvent};
pub use cache::{cache_key, ReportCache};
pub use engine::AnalyticsEngine;
pub use report::{ConversationMetrics, DecisionMetrics, KnowledgeGapMetrics, ProductivityInsights, Report, ReportFormat};
