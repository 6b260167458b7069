// crates/analytics-engine/src/report.rs
//! The Report value type and its four sub-aggregations. Plain data: the
//! Engine is the only thing that builds one.

use analytics_types::TimeRange;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Summary,
    Detailed,
    Executive,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Summary => "summary",
            ReportFormat::Detailed => "detailed",
            ReportFormat::Executive => "executive",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetrics {
    pub total_conversations: u32,
    pub average_depth_score: f64,
    pub average_circularity_index: f64,
    pub total_topic_transitions: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductivityInsights {
    pub average_productivity: f64,
    pub median_productivity: f64,
    pub trend: f64,
    pub total_insights: u32,
    pub peak_hours: Vec<u8>,
    pub optimal_session_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGapMetrics {
    pub unresolved_count: u32,
    pub top_cluster_priority: Option<String>,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMetrics {
    pub total_decisions: u32,
    pub average_outcome_score: f64,
    pub reversal_rate: f64,
    pub weekly_velocity: f64,
}

/// The Engine's top-level report. Every sub-aggregation defaults to
/// zero on its own failure (§7, "Report generation applies
/// zero-defaults on sub-aggregation failure") so one failing query never
/// fails the whole report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub format: ReportFormat,
    pub range: TimeRange,
    pub conversation_metrics: ConversationMetrics,
    pub productivity_insights: ProductivityInsights,
    pub knowledge_gap_metrics: KnowledgeGapMetrics,
    pub decision_metrics: DecisionMetrics,
    pub recommendations: Vec<String>,
    pub insights: Vec<String>,
    pub generated_at: i64,
}
