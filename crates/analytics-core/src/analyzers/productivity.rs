// crates/analytics-core/src/analyzers/productivity.rs
use crate::analyzer::Analyzer;
use crate::text::is_question;
use analytics_types::{Conversation, Message, MessageRole, TimeRange};

/// Output of `ProductivityAnalyzer`. Merged into `ConversationAnalytics`
/// by the engine; `peak_period` has no home there and is folded into
/// `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductivityMetrics {
    /// 0-100
    pub productivity_score: f64,
    /// 0-100
    pub engagement_score: f64,
    pub session_duration_ms: i64,
    pub active_time_ms: i64,
    pub avg_response_latency_ms: f64,
    /// 0-100
    pub question_quality_avg: f64,
    /// 0-100
    pub response_quality_avg: f64,
    /// 0-100
    pub effectiveness_score: f64,
    pub insight_count: u32,
    pub breakthrough_count: u32,
    pub peak_period: Option<TimeRange>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductivityAnalyzer;

impl ProductivityAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

const INSIGHT_MARKERS: &[&str] = &["i see", "that makes sense", "got it", "now i understand", "ah, i"];
const BREAKTHROUGH_MARKERS: &[&str] = &["that's exactly it", "eureka", "finally", "that solved it", "perfect, that works"];

fn marker_count(content: &str, markers: &[&str]) -> u32 {
    let lower = content.to_lowercase();
    markers.iter().filter(|m| lower.contains(*m)).count() as u32
}

impl Analyzer for ProductivityAnalyzer {
    type Output = ProductivityMetrics;

    fn analyze(&self, _conversation: &Conversation, messages: &[Message]) -> ProductivityMetrics {
        if messages.is_empty() {
            return ProductivityMetrics {
                productivity_score: 0.0,
                engagement_score: 0.0,
                session_duration_ms: 0,
                active_time_ms: 0,
                avg_response_latency_ms: 0.0,
                question_quality_avg: 0.0,
                response_quality_avg: 0.0,
                effectiveness_score: 0.0,
                insight_count: 0,
                breakthrough_count: 0,
                peak_period: None,
            };
        }

        let session_duration_ms = (messages.last().unwrap().created_at - messages.first().unwrap().created_at).max(0);

        let mut latencies = Vec::new();
        for w in messages.windows(2) {
            if w[0].role == MessageRole::User && w[1].role == MessageRole::Assistant {
                latencies.push((w[1].created_at - w[0].created_at).max(0) as f64);
            }
        }
        let avg_response_latency_ms = if latencies.is_empty() { 0.0 } else { latencies.iter().sum::<f64>() / latencies.len() as f64 };

        let active_time_ms: i64 = messages.windows(2).map(|w| (w[1].created_at - w[0].created_at).max(0).min(5 * 60_000)).sum();

        let questions: Vec<&Message> = messages.iter().filter(|m| m.role == MessageRole::User && is_question(&m.content)).collect();
        let question_density = questions.len() as f64 / messages.len() as f64;

        let question_quality_avg = if questions.is_empty() {
            0.0
        } else {
            let total: f64 = questions
                .iter()
                .map(|m| {
                    let len_component = (m.content.len() as f64 / 200.0).min(1.0) * 60.0;
                    let depth_component = crate::text::question_depth_weight(&m.content) * 40.0;
                    len_component + depth_component
                })
                .sum();
            (total / questions.len() as f64).clamp(0.0, 100.0)
        };

        let assistant_msgs: Vec<&Message> = messages.iter().filter(|m| m.role == MessageRole::Assistant).collect();
        let avg_assistant_len = if assistant_msgs.is_empty() {
            0.0
        } else {
            assistant_msgs.iter().map(|m| m.content.len()).sum::<usize>() as f64 / assistant_msgs.len() as f64
        };
        let response_quality_avg = (avg_assistant_len / 400.0).min(1.0) * 100.0;

        let alternations = messages.windows(2).filter(|w| w[0].role != w[1].role).count();
        let alternation_rate = alternations as f64 / (messages.len() - 1).max(1) as f64;

        let engagement_score = (question_density.min(1.0) * 30.0 + (avg_assistant_len / 400.0).min(1.0) * 30.0 + alternation_rate * 40.0).clamp(0.0, 100.0);

        let insight_count: u32 = assistant_msgs.iter().map(|m| marker_count(&m.content, INSIGHT_MARKERS)).sum();
        let breakthrough_count: u32 = messages.iter().map(|m| marker_count(&m.content, BREAKTHROUGH_MARKERS)).sum();

        let effectiveness_score = ((insight_count as f64 * 10.0 + breakthrough_count as f64 * 20.0) / messages.len() as f64 * 10.0).clamp(0.0, 100.0);

        let productivity_score = (engagement_score * 0.35
            + question_quality_avg * 0.2
            + response_quality_avg * 0.2
            + effectiveness_score * 0.25)
            .clamp(0.0, 100.0);

        let peak_period = if messages.len() >= 4 {
            let window = messages.len() / 2;
            let mut best_start = 0usize;
            let mut best_score = f64::MIN;
            for start in 0..=messages.len() - window {
                let slice = &messages[start..start + window];
                let score = slice.iter().map(|m| marker_count(&m.content, INSIGHT_MARKERS) + marker_count(&m.content, BREAKTHROUGH_MARKERS)).sum::<u32>() as f64;
                if score > best_score {
                    best_score = score;
                    best_start = start;
                }
            }
            Some(TimeRange { start: messages[best_start].created_at, end: messages[best_start + window - 1].created_at })
        } else {
            None
        };

        ProductivityMetrics {
            productivity_score,
            engagement_score,
            session_duration_ms,
            active_time_ms,
            avg_response_latency_ms,
            question_quality_avg,
            response_quality_avg,
            effectiveness_score,
            insight_count,
            breakthrough_count,
            peak_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::AttributeBag;

    fn conversation() -> Conversation {
        Conversation { id: "c1".into(), created_at: 0, updated_at: 0, title: None, attributes: AttributeBag::new() }
    }

    fn msg(role: MessageRole, content: &str, created_at: i64) -> Message {
        Message { id: format!("m{created_at}"), conversation_id: "c1".into(), role, content: content.into(), created_at }
    }

    #[test]
    fn empty_conversation_yields_zeroed_metrics() {
        let metrics = ProductivityAnalyzer::new().analyze(&conversation(), &[]);
        assert_eq!(metrics.productivity_score, 0.0);
        assert_eq!(metrics.peak_period, None);
    }

    #[test]
    fn scores_are_bounded() {
        let messages = vec![
            msg(MessageRole::User, "why is latency so high here?", 0),
            msg(MessageRole::Assistant, "that's exactly it, the cache ttl was too short and caused thrashing under load", 1000),
            msg(MessageRole::User, "got it, that makes sense now", 2000),
            msg(MessageRole::Assistant, "glad it clicked, let's ship the fix", 3000),
        ];
        let metrics = ProductivityAnalyzer::new().analyze(&conversation(), &messages);
        assert!((0.0..=100.0).contains(&metrics.productivity_score));
        assert!((0.0..=100.0).contains(&metrics.engagement_score));
        assert!(metrics.insight_count >= 1);
    }

    #[test]
    fn breakthrough_marker_is_detected() {
        let messages = vec![
            msg(MessageRole::User, "any luck?", 0),
            msg(MessageRole::Assistant, "finally, that solved it!", 1000),
        ];
        let metrics = ProductivityAnalyzer::new().analyze(&conversation(), &messages);
        assert!(metrics.breakthrough_count >= 1);
    }
}
