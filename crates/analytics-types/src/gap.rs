//! `KnowledgeGap`: a recurring question, topic, skill, or concept the
//! corpus keeps circling back to without resolving.

use crate::conversation::TimestampMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    Question,
    Topic,
    Skill,
    Concept,
}

impl GapType {
    pub fn as_str(self) -> &'static str {
        match self {
            GapType::Question => "question",
            GapType::Topic => "topic",
            GapType::Skill => "skill",
            GapType::Concept => "concept",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "question" => Some(GapType::Question),
            "topic" => Some(GapType::Topic),
            "skill" => Some(GapType::Skill),
            "concept" => Some(GapType::Concept),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGap {
    pub id: Option<String>,
    pub gap_type: GapType,
    pub content: String,
    pub normalized_content: String,
    pub frequency: u32,
    pub first_occurrence: TimestampMs,
    pub last_occurrence: TimestampMs,
    /// 0-100
    pub exploration_depth: f64,
    pub resolved: bool,
    pub resolution_conversation_id: Option<String>,
    pub resolution_date: Option<TimestampMs>,
    /// 0-100
    pub resolution_quality: Option<f64>,
    pub related_entities: Vec<String>,
    pub related_gaps: Vec<String>,
    pub suggested_actions: Vec<String>,
    pub suggested_resources: Vec<String>,
}

impl KnowledgeGap {
    /// A gap's identity under the dedup invariant: `(normalized_content, gap_type)`.
    pub fn identity_key(&self) -> (String, GapType) {
        (self.normalized_content.clone(), self.gap_type)
    }
}

/// Lowercase, strip punctuation, and collapse whitespace — the canonical
/// identity transform for a gap's `content`.
pub fn normalize_content(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_punctuation_and_whitespace() {
        assert_eq!(normalize_content("CAP theorem"), normalize_content("CAP Theorem!"));
        assert_eq!(normalize_content("  hello   world  "), "hello world");
    }

    #[test]
    fn gap_type_round_trips() {
        for gt in [GapType::Question, GapType::Topic, GapType::Skill, GapType::Concept] {
            assert_eq!(GapType::parse(gt.as_str()), Some(gt));
        }
    }
}
