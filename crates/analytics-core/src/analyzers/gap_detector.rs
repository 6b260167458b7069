// crates/analytics-core/src/analyzers/gap_detector.rs
use crate::analyzer::Analyzer;
use crate::text::{has_uncertainty_marker, is_question};
use analytics_types::{normalize_content, Conversation, GapType, KnowledgeGap, Message, MessageRole};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct KnowledgeGapDetector;

impl KnowledgeGapDetector {
    pub fn new() -> Self {
        Self
    }

    /// Content-complexity keywords that raise the estimated exploration
    /// depth of a candidate gap beyond its message's raw length.
    fn complexity_bonus(content: &str) -> f64 {
        let lower = content.to_lowercase();
        let markers = ["architecture", "trade-off", "tradeoff", "algorithm", "consistency", "distributed", "invariant"];
        markers.iter().filter(|m| lower.contains(**m)).count() as f64 * 8.0
    }

    fn exploration_depth(content: &str) -> f64 {
        let len_component = (content.len() as f64 / 300.0).min(1.0) * 60.0;
        (len_component + Self::complexity_bonus(content)).clamp(0.0, 100.0)
    }
}

/// Whether a user question is ever followed by a substantive assistant
/// reply before the conversation ends or another user question starts —
/// if not, it is "unresolved".
fn is_unresolved_question(messages: &[Message], idx: usize) -> bool {
    messages[idx + 1..]
        .iter()
        .take_while(|m| m.role != MessageRole::User)
        .all(|m| m.content.trim().len() < 20)
}

impl Analyzer for KnowledgeGapDetector {
    type Output = Vec<KnowledgeGap>;

    fn analyze(&self, _conversation: &Conversation, messages: &[Message]) -> Vec<KnowledgeGap> {
        let mut merged: HashMap<(String, GapType), KnowledgeGap> = HashMap::new();

        let mut push = |gap_type: GapType, content: String, occurrence: i64, depth: f64| {
            let normalized = normalize_content(&content);
            let key = (normalized.clone(), gap_type);
            merged
                .entry(key)
                .and_modify(|g| {
                    g.frequency += 1;
                    g.first_occurrence = g.first_occurrence.min(occurrence);
                    g.last_occurrence = g.last_occurrence.max(occurrence);
                    g.exploration_depth = g.exploration_depth.max(depth);
                })
                .or_insert(KnowledgeGap {
                    id: None,
                    gap_type,
                    content,
                    normalized_content: normalized,
                    frequency: 1,
                    first_occurrence: occurrence,
                    last_occurrence: occurrence,
                    exploration_depth: depth,
                    resolved: false,
                    resolution_conversation_id: None,
                    resolution_date: None,
                    resolution_quality: None,
                    related_entities: Vec::new(),
                    related_gaps: Vec::new(),
                    suggested_actions: Vec::new(),
                    suggested_resources: Vec::new(),
                });
        };

        for (idx, m) in messages.iter().enumerate() {
            if m.role != MessageRole::User {
                continue;
            }
            let depth = KnowledgeGapDetector::exploration_depth(&m.content);
            if is_question(&m.content) && is_unresolved_question(messages, idx) {
                push(GapType::Question, m.content.clone(), m.created_at, depth);
            }
            if has_uncertainty_marker(&m.content) {
                push(GapType::Concept, m.content.clone(), m.created_at, depth);
            }
        }

        let mut topic_counts: HashMap<String, (u32, i64, i64)> = HashMap::new();
        for t in messages.iter().flat_map(|m| crate::text::extract_topics(&m.content)) {
            let entry = topic_counts.entry(t.topic).or_insert((0, i64::MAX, i64::MIN));
            entry.0 += t.frequency;
        }
        for (topic, (count, _, _)) in topic_counts {
            if count >= 3 {
                push(GapType::Topic, topic, messages.first().map(|m| m.created_at).unwrap_or(0), 20.0);
            }
        }

        let mut gaps: Vec<KnowledgeGap> = merged.into_values().collect();
        gaps.sort_by(|a, b| a.first_occurrence.cmp(&b.first_occurrence));
        gaps
    }
}
