//! `ConversationAnalytics`: one logical record per conversation per
//! analysis pass. The *latest* row (greatest `analyzed_at`) is
//! authoritative for a given conversation.

use crate::attribute::AttributeBag;
use crate::conversation::TimestampMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationAnalytics {
    pub id: Option<String>,
    pub conversation_id: String,
    pub analyzed_at: TimestampMs,
    pub topic_count: u32,
    pub topic_transitions: u32,
    /// 0-100
    pub depth_score: f64,
    /// 0-1
    pub circularity_index: f64,
    /// 0-100
    pub productivity_score: f64,
    pub resolution_time: Option<i64>,
    pub insight_count: u32,
    pub breakthrough_count: u32,
    /// 0-100
    pub question_quality_avg: f64,
    /// 0-100
    pub response_quality_avg: f64,
    /// 0-100
    pub engagement_score: f64,
    #[serde(default)]
    pub metadata: AttributeBag,
}

impl ConversationAnalytics {
    /// Clamp every bounded field into its documented range. Analyzer
    /// output is trusted but not infallible arithmetic can still drift a
    /// hair outside [0,100]/[0,1]; this is the single place that enforces
    /// the data-model invariants before a row is persisted.
    pub fn clamped(mut self) -> Self {
        self.depth_score = self.depth_score.clamp(0.0, 100.0);
        self.circularity_index = self.circularity_index.clamp(0.0, 1.0);
        self.productivity_score = self.productivity_score.clamp(0.0, 100.0);
        self.question_quality_avg = self.question_quality_avg.clamp(0.0, 100.0);
        self.response_quality_avg = self.response_quality_avg.clamp(0.0, 100.0);
        self.engagement_score = self.engagement_score.clamp(0.0, 100.0);
        self
    }
}
