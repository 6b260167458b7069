// crates/analytics-core/src/analyzers/flow.rs
use crate::analyzer::Analyzer;
use crate::text::{extract_topics, question_depth_weight, technical_terms};
use analytics_types::{Conversation, Message, MessageRole};
use std::collections::HashSet;

/// Output of `FlowAnalyzer`: topic dynamics, depth, and circularity for a
/// single conversation. Merged into `ConversationAnalytics` by the engine;
/// the fields with no counterpart there (`coherence_score`,
/// `progression_score`, `average_topic_duration`, `vocabulary_richness`)
/// are folded into its `metadata` bag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMetrics {
    pub topic_count: u32,
    pub topic_transitions: u32,
    /// 0-100
    pub depth_score: f64,
    /// 0-1
    pub circularity_index: f64,
    /// 0-100
    pub coherence_score: f64,
    /// 0-100
    pub progression_score: f64,
    pub average_topic_duration_ms: f64,
    /// 0-1
    pub vocabulary_richness: f64,
    pub resolution_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlowAnalyzer;

impl FlowAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

/// The single dominant topic of a message (highest-scored extracted
/// topic, or `None` when the message carries no recognizable topic).
fn dominant_topic(content: &str) -> Option<String> {
    extract_topics(content)
        .into_iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        .map(|t| t.topic)
}

impl Analyzer for FlowAnalyzer {
    type Output = FlowMetrics;

    fn analyze(&self, _conversation: &Conversation, messages: &[Message]) -> FlowMetrics {
        if messages.is_empty() {
            return FlowMetrics {
                topic_count: 0,
                topic_transitions: 0,
                depth_score: 0.0,
                circularity_index: 0.0,
                coherence_score: 0.0,
                progression_score: 0.0,
                average_topic_duration_ms: 0.0,
                vocabulary_richness: 0.0,
                resolution_time: None,
            };
        }

        let mut all_topics: HashSet<String> = HashSet::new();
        let mut topic_sequence: Vec<(String, i64)> = Vec::new();
        for m in messages {
            for t in extract_topics(&m.content) {
                all_topics.insert(t.topic);
            }
            if let Some(topic) = dominant_topic(&m.content) {
                topic_sequence.push((topic, m.created_at));
            }
        }

        let mut transitions = 0u32;
        let mut returns_to_prior = 0u32;
        let mut seen_before_current_run: HashSet<&str> = HashSet::new();
        for window in topic_sequence.windows(2) {
            let (prev, _) = &window[0];
            let (curr, _) = &window[1];
            seen_before_current_run.insert(prev.as_str());
            if curr != prev {
                transitions += 1;
                if seen_before_current_run.contains(curr.as_str()) {
                    returns_to_prior += 1;
                }
            }
        }

        let circularity_index = returns_to_prior as f64 / transitions.max(1) as f64;

        let avg_len = messages.iter().map(|m| m.content.len()).sum::<usize>() as f64 / messages.len() as f64;
        let length_component = (avg_len / 500.0).min(1.0) * 25.0;

        let question_component = {
            let weights: f64 = messages.iter().map(|m| question_depth_weight(&m.content)).sum();
            (weights / messages.len() as f64).min(1.0) * 25.0
        };

        let breadth_component = (all_topics.len() as f64 / 10.0).min(1.0) * 20.0;

        let follow_up_density = {
            let follow_ups = messages
                .windows(2)
                .filter(|w| w[0].role == MessageRole::Assistant && w[1].role == MessageRole::User)
                .count();
            (follow_ups as f64 / messages.len().max(1) as f64).min(1.0) * 15.0
        };

        let technical_density = {
            let total_terms: usize = messages.iter().map(|m| technical_terms(&m.content).len()).sum();
            (total_terms as f64 / messages.len() as f64 / 3.0).min(1.0) * 15.0
        };

        let depth_score =
            (length_component + question_component + breadth_component + follow_up_density + technical_density)
                .clamp(0.0, 100.0);

        let total_words: Vec<String> = messages
            .iter()
            .flat_map(|m| crate::text::tokenize(&m.content))
            .collect();
        let unique_words: HashSet<&String> = total_words.iter().collect();
        let vocabulary_richness = if total_words.is_empty() {
            0.0
        } else {
            (unique_words.len() as f64 / total_words.len() as f64).clamp(0.0, 1.0)
        };

        let coherence_score = ((1.0 - circularity_index) * 60.0 + (1.0 - transitions as f64 / messages.len().max(1) as f64).clamp(0.0, 1.0) * 40.0).clamp(0.0, 100.0);

        let progression_score = if topic_sequence.len() < 2 {
            0.0
        } else {
            let distinct_run_length = all_topics.len() as f64;
            (distinct_run_length / topic_sequence.len() as f64 * 100.0).clamp(0.0, 100.0)
        };

        let average_topic_duration_ms = if topic_sequence.len() < 2 {
            0.0
        } else {
            let span = (topic_sequence.last().unwrap().1 - topic_sequence.first().unwrap().1).max(0) as f64;
            span / all_topics.len().max(1) as f64
        };

        let resolution_time = {
            let last_user_question = messages.iter().rev().find(|m| m.role == MessageRole::User && question_depth_weight(&m.content) > 0.0);
            match last_user_question {
                Some(q) => messages
                    .iter()
                    .find(|m| m.role == MessageRole::Assistant && m.created_at >= q.created_at)
                    .map(|a| a.created_at - q.created_at),
                None => None,
            }
        };

        FlowMetrics {
            topic_count: all_topics.len() as u32,
            topic_transitions: transitions,
            depth_score,
            circularity_index,
            coherence_score,
            progression_score,
            average_topic_duration_ms,
            vocabulary_richness,
            resolution_time,
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
        let metrics = FlowAnalyzer::new().analyze(&conversation(), &[]);
        assert_eq!(metrics.topic_count, 0);
        assert_eq!(metrics.depth_score, 0.0);
    }

    #[test]
    fn circular_conversation_revisiting_topics_has_nonzero_circularity() {
        let messages = vec![
            msg(MessageRole::User, "let's talk about the database schema", 0),
            msg(MessageRole::Assistant, "sure, the database schema looks fine", 1000),
            msg(MessageRole::User, "now about deployment pipelines", 2000),
            msg(MessageRole::Assistant, "pipelines are automated", 3000),
            msg(MessageRole::User, "back to the database schema again", 4000),
        ];
        let metrics = FlowAnalyzer::new().analyze(&conversation(), &messages);
        assert!(metrics.circularity_index > 0.0);
    }

    #[test]
    fn depth_score_is_bounded() {
        let messages = vec![msg(MessageRole::User, "why does the cache invalidate so often, what if we used a smaller ttl?", 0)];
        let metrics = FlowAnalyzer::new().analyze(&conversation(), &messages);
        assert!((0.0..=100.0).contains(&metrics.depth_score));
    }

    #[test]
    fn vocabulary_richness_is_bounded() {
        let messages = vec![msg(MessageRole::User, "the the the the unique words here", 0)];
        let metrics = FlowAnalyzer::new().analyze(&conversation(), &messages);
        assert!((0.0..=1.0).contains(&metrics.vocabulary_richness));
    }
}
