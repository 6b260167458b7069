//! `DecisionTracking`: the lifecycle of a single decision surfaced from a
//! conversation (or set of conversations).

use crate::conversation::TimestampMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Strategic,
    Tactical,
    Operational,
    Personal,
}

impl DecisionType {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionType::Strategic => "strategic",
            DecisionType::Tactical => "tactical",
            DecisionType::Operational => "operational",
            DecisionType::Personal => "personal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strategic" => Some(DecisionType::Strategic),
            "tactical" => Some(DecisionType::Tactical),
            "operational" => Some(DecisionType::Operational),
            "personal" => Some(DecisionType::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Decided,
    Implemented,
    Assessed,
    Reversed,
}

impl DecisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStatus::Pending => "pending",
            DecisionStatus::Decided => "decided",
            DecisionStatus::Implemented => "implemented",
            DecisionStatus::Assessed => "assessed",
            DecisionStatus::Reversed => "reversed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DecisionStatus::Pending),
            "decided" => Some(DecisionStatus::Decided),
            "implemented" => Some(DecisionStatus::Implemented),
            "assessed" => Some(DecisionStatus::Assessed),
            "reversed" => Some(DecisionStatus::Reversed),
            _ => None,
        }
    }
}

/// The five lifecycle timestamps of a decision. Any may be absent, but
/// the ones present must be non-decreasing in this order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionLifecycle {
    pub problem_identified_at: Option<TimestampMs>,
    pub options_considered_at: Option<TimestampMs>,
    pub decision_made_at: Option<TimestampMs>,
    pub implementation_started_at: Option<TimestampMs>,
    pub outcome_assessed_at: Option<TimestampMs>,
}

impl DecisionLifecycle {
    /// True when every present timestamp is monotone non-decreasing in
    /// lifecycle order.
    pub fn is_monotone(&self) -> bool {
        let stamps = [
            self.problem_identified_at,
            self.options_considered_at,
            self.decision_made_at,
            self.implementation_started_at,
            self.outcome_assessed_at,
        ];
        let present: Vec<TimestampMs> = stamps.into_iter().flatten().collect();
        present.windows(2).all(|w| w[0] <= w[1])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTracking {
    pub id: Option<String>,
    pub decision_summary: String,
    pub decision_type: Option<DecisionType>,
    pub conversation_ids: Vec<String>,
    pub lifecycle: DecisionLifecycle,
    /// 0-100
    pub clarity_score: f64,
    /// 0-100
    pub confidence_level: f64,
    /// 0-100
    pub consensus_level: f64,
    pub reversal_count: u32,
    pub modification_count: u32,
    /// 0-100
    pub outcome_score: Option<f64>,
    pub information_completeness: f64,
    pub stakeholder_count: u32,
    pub alternatives_considered: u32,
    pub risk_assessed: bool,
    pub success_factors: Vec<String>,
    pub failure_factors: Vec<String>,
    pub lessons_learned: Vec<String>,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub status: DecisionStatus,
}

impl DecisionTracking {
    /// Invariant: `status = reversed` implies `reversal_count >= 1`.
    pub fn is_status_consistent(&self) -> bool {
        self.status != DecisionStatus::Reversed || self.reversal_count >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotone_lifecycle_accepts_partial_timestamps() {
        let lc = DecisionLifecycle {
            problem_identified_at: Some(1),
            decision_made_at: Some(5),
            ..Default::default()
        };
        assert!(lc.is_monotone());
    }

    #[test]
    fn rejects_out_of_order_timestamps() {
        let lc = DecisionLifecycle {
            decision_made_at: Some(10),
            implementation_started_at: Some(5),
            ..Default::default()
        };
        assert!(!lc.is_monotone());
    }

    #[test]
    fn reversed_without_reversal_count_is_inconsistent() {
        let d = DecisionTracking {
            id: None,
            decision_summary: "x".into(),
            decision_type: None,
            conversation_ids: vec![],
            lifecycle: DecisionLifecycle::default(),
            clarity_score: 0.0,
            confidence_level: 0.0,
            consensus_level: 0.0,
            reversal_count: 0,
            modification_count: 0,
            outcome_score: None,
            information_completeness: 0.0,
            stakeholder_count: 0,
            alternatives_considered: 0,
            risk_assessed: false,
            success_factors: vec![],
            failure_factors: vec![],
            lessons_learned: vec![],
            tags: vec![],
            priority: Priority::Low,
            status: DecisionStatus::Reversed,
        };
        assert!(!d.is_status_consistent());
    }
}
