// crates/analytics-core/src/analyzers/decision_tracker.rs
use crate::analyzer::Analyzer;
use analytics_types::{Conversation, DecisionLifecycle, DecisionStatus, DecisionTracking, DecisionType, Message, MessageRole, Priority};

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionTracker;

impl DecisionTracker {
    pub fn new() -> Self {
        Self
    }
}

const DECISION_MARKERS: &[&str] = &["we decided", "let's go with", "i'll choose", "we will use", "decided to", "going with", "the decision is"];

fn is_decision_message(content: &str) -> bool {
    let lower = content.to_lowercase();
    DECISION_MARKERS.iter().any(|m| lower.contains(m))
}

fn guess_decision_type(content: &str) -> DecisionType {
    let lower = content.to_lowercase();
    if ["roadmap", "strategy", "long-term", "long term", "vision"].iter().any(|k| lower.contains(k)) {
        DecisionType::Strategic
    } else if ["budget", "hiring", "team", "process"].iter().any(|k| lower.contains(k)) {
        DecisionType::Tactical
    } else if ["deploy", "config", "script", "pipeline", "schema"].iter().any(|k| lower.contains(k)) {
        DecisionType::Operational
    } else {
        DecisionType::Personal
    }
}

fn clarity_score(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let mut score = 50.0;
    if ["decided", "because", "therefore", "so we"].iter().any(|k| lower.contains(k)) {
        score += 25.0;
    }
    if ["maybe", "unsure", "not certain", "perhaps"].iter().any(|k| lower.contains(k)) {
        score -= 30.0;
    }
    score.clamp(0.0, 100.0)
}

fn confidence_level(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let mut score = 50.0;
    if ["confident", "certain", "sure", "definitely"].iter().any(|k| lower.contains(k)) {
        score += 25.0;
    }
    if ["maybe", "unsure", "risky", "uncertain"].iter().any(|k| lower.contains(k)) {
        score -= 25.0;
    }
    score.clamp(0.0, 100.0)
}

fn information_completeness(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let mut score = 40.0;
    if ["after reviewing", "we compared", "analysis shows", "data shows", "considering"].iter().any(|k| lower.contains(k)) {
        score += 30.0;
    }
    if content.len() > 200 {
        score += 15.0;
    }
    score.clamp(0.0, 100.0)
}

fn alternatives_considered(content: &str) -> u32 {
    let lower = content.to_lowercase();
    ["option", "alternative", "instead of", "versus", " vs "].iter().filter(|k| lower.contains(**k)).count() as u32
}

fn risk_assessed(content: &str) -> bool {
    let lower = content.to_lowercase();
    ["risk", "downside", "trade-off", "tradeoff", "mitigat"].iter().any(|k| lower.contains(k))
}

fn derive_tags(content: &str) -> Vec<String> {
    crate::text::technical_terms(content)
        .into_iter()
        .chain(crate::text::business_terms(content))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn derive_priority(content: &str) -> Priority {
    let lower = content.to_lowercase();
    if ["critical", "urgent", "asap", "outage"].iter().any(|k| lower.contains(k)) {
        Priority::Critical
    } else if ["important", "soon", "high priority"].iter().any(|k| lower.contains(k)) {
        Priority::High
    } else if ["when possible", "eventually", "low priority", "nice to have"].iter().any(|k| lower.contains(k)) {
        Priority::Low
    } else {
        Priority::Medium
    }
}

impl Analyzer for DecisionTracker {
    type Output = Vec<DecisionTracking>;

    fn analyze(&self, conversation: &Conversation, messages: &[Message]) -> Vec<DecisionTracking> {
        let mut decisions = Vec::new();
        for (idx, m) in messages.iter().enumerate() {
            if m.role != MessageRole::Assistant || !is_decision_message(&m.content) {
                continue;
            }
            let problem_identified_at = messages[..idx]
                .iter()
                .rev()
                .find(|p| p.role == MessageRole::User)
                .map(|p| p.created_at);

            decisions.push(DecisionTracking {
                id: None,
                decision_summary: m.content.chars().take(280).collect(),
                decision_type: Some(guess_decision_type(&m.content)),
                conversation_ids: vec![conversation.id.clone()],
                lifecycle: DecisionLifecycle {
                    problem_identified_at,
                    options_considered_at: problem_identified_at,
                    decision_made_at: Some(m.created_at),
                    implementation_started_at: None,
                    outcome_assessed_at: None,
                },
                clarity_score: clarity_score(&m.content),
                confidence_level: confidence_level(&m.content),
                consensus_level: 50.0,
                reversal_count: 0,
                modification_count: 0,
                outcome_score: None,
                information_completeness: information_completeness(&m.content),
                stakeholder_count: 1,
                alternatives_considered: alternatives_considered(&m.content),
                risk_assessed: risk_assessed(&m.content),
                success_factors: Vec::new(),
                failure_factors: Vec::new(),
                lessons_learned: Vec::new(),
                tags: derive_tags(&m.content),
                priority: derive_priority(&m.content),
                status: DecisionStatus::Decided,
            });
        }
        decisions
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
    fn extracts_decision_from_assistant_message_with_marker() {
        let messages = vec![
            msg(MessageRole::User, "should we use postgres or sqlite for this service?", 0),
            msg(MessageRole::Assistant, "we decided to go with postgres because it handles concurrent writes better", 1000),
        ];
        let decisions = DecisionTracker::new().analyze(&conversation(), &messages);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].lifecycle.problem_identified_at, Some(0));
        assert_eq!(decisions[0].lifecycle.decision_made_at, Some(1000));
        assert!(decisions[0].lifecycle.is_monotone());
    }

    #[test]
    fn no_marker_yields_no_decisions() {
        let messages = vec![msg(MessageRole::Assistant, "here's some background information", 0)];
        assert!(DecisionTracker::new().analyze(&conversation(), &messages).is_empty());
    }

    #[test]
    fn uncertain_language_lowers_clarity_and_confidence() {
        let messages = vec![msg(MessageRole::Assistant, "we decided to go with redis, maybe, still unsure if it's right", 0)];
        let decisions = DecisionTracker::new().analyze(&conversation(), &messages);
        assert!(decisions[0].clarity_score < 50.0);
        assert!(decisions[0].confidence_level < 50.0);
    }

    #[test]
    fn emits_in_chronological_order() {
        let messages = vec![
            msg(MessageRole::Assistant, "we decided to use option A", 0),
            msg(MessageRole::Assistant, "we decided to use option B", 1000),
        ];
        let decisions = DecisionTracker::new().analyze(&conversation(), &messages);
        assert!(decisions[0].lifecycle.decision_made_at < decisions[1].lifecycle.decision_made_at);
    }
}
