// crates/analytics-db/src/queries/decision_tracking.rs
use crate::error::classify;
use crate::{BatchOptions, BatchOutcome, Database};
use analytics_core::{math, AnalyticsResult};
use analytics_types::{
    sequence_from_storage_text, sequence_to_storage_text, DecisionLifecycle, DecisionStatus, DecisionTracking,
    DecisionType, Priority, TimeRange,
};
use sqlx::Row;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecisionAnalysis {
    pub total_decisions: u32,
    pub average_outcome_score: f64,
    pub average_time_to_decision_hours: f64,
    pub average_time_to_implementation_hours: f64,
    pub reversal_rate: f64,
    pub top_success_factors: Vec<(String, u32)>,
    pub common_pitfalls: Vec<(String, u32)>,
    pub weekly_velocity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPattern {
    pub decision_type: DecisionType,
    pub count: u32,
    pub average_outcome_score: f64,
    pub reversal_rate: f64,
}

fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> Result<DecisionTracking, sqlx::Error> {
    let decision_type: Option<String> = row.try_get("decision_type")?;
    let priority_str: String = row.try_get("priority")?;
    let status_str: String = row.try_get("status")?;
    Ok(DecisionTracking {
        id: row.try_get("id")?,
        decision_summary: row.try_get("decision_summary")?,
        decision_type: decision_type.and_then(|s| DecisionType::parse(&s)),
        conversation_ids: sequence_from_storage_text(row.try_get::<Option<String>, _>("conversation_ids")?.as_deref()),
        lifecycle: DecisionLifecycle {
            problem_identified_at: row.try_get("problem_identified_at")?,
            options_considered_at: row.try_get("options_considered_at")?,
            decision_made_at: row.try_get("decision_made_at")?,
            implementation_started_at: row.try_get("implementation_started_at")?,
            outcome_assessed_at: row.try_get("outcome_assessed_at")?,
        },
        clarity_score: row.try_get("clarity_score")?,
        confidence_level: row.try_get("confidence_level")?,
        consensus_level: row.try_get("consensus_level")?,
        reversal_count: row.try_get::<i64, _>("reversal_count")? as u32,
        modification_count: row.try_get::<i64, _>("modification_count")? as u32,
        outcome_score: row.try_get("outcome_score")?,
        information_completeness: row.try_get("information_completeness")?,
        stakeholder_count: row.try_get::<i64, _>("stakeholder_count")? as u32,
        alternatives_considered: row.try_get::<i64, _>("alternatives_considered")? as u32,
        risk_assessed: row.try_get::<i64, _>("risk_assessed")? != 0,
        success_factors: sequence_from_storage_text(row.try_get::<Option<String>, _>("success_factors")?.as_deref()),
        failure_factors: sequence_from_storage_text(row.try_get::<Option<String>, _>("failure_factors")?.as_deref()),
        lessons_learned: sequence_from_storage_text(row.try_get::<Option<String>, _>("lessons_learned")?.as_deref()),
        tags: sequence_from_storage_text(row.try_get::<Option<String>, _>("tags")?.as_deref()),
        priority: Priority::parse(&priority_str).unwrap_or(Priority::Medium),
        status: DecisionStatus::parse(&status_str).unwrap_or(DecisionStatus::Pending),
    })
}

impl Database {
    /// Inserts with status `decided`.
    pub async fn save_decision(&self, decision: &DecisionTracking) -> AnalyticsResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"INSERT INTO decision_tracking
               (id, decision_summary, decision_type, conversation_ids, problem_identified_at,
                options_considered_at, decision_made_at, implementation_started_at, outcome_assessed_at,
                clarity_score, confidence_level, consensus_level, reversal_count, modification_count,
                outcome_score, information_completeness, stakeholder_count, alternatives_considered,
                risk_assessed, success_factors, failure_factors, lessons_learned, tags, priority, status,
                created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&decision.decision_summary)
        .bind(decision.decision_type.map(|t| t.as_str()))
        .bind(sequence_to_storage_text(&decision.conversation_ids))
        .bind(decision.lifecycle.problem_identified_at)
        .bind(decision.lifecycle.options_considered_at)
        .bind(decision.lifecycle.decision_made_at)
        .bind(decision.lifecycle.implementation_started_at)
        .bind(decision.lifecycle.outcome_assessed_at)
        .bind(decision.clarity_score)
        .bind(decision.confidence_level)
        .bind(decision.consensus_level)
        .bind(decision.reversal_count as i64)
        .bind(decision.modification_count as i64)
        .bind(decision.outcome_score)
        .bind(decision.information_completeness)
        .bind(decision.stakeholder_count as i64)
        .bind(decision.alternatives_considered as i64)
        .bind(decision.risk_assessed as i64)
        .bind(sequence_to_storage_text(&decision.success_factors))
        .bind(sequence_to_storage_text(&decision.failure_factors))
        .bind(sequence_to_storage_text(&decision.lessons_learned))
        .bind(sequence_to_storage_text(&decision.tags))
        .bind(decision.priority.as_str())
        .bind(DecisionStatus::Decided.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        debug!(decision_id = %id, "saved decision");
        Ok(id)
    }

    /// Sets outcome score/timestamp and transitions to `assessed`.
    pub async fn update_outcome(&self, decision_id: &str, outcome_score: f64) -> AnalyticsResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "UPDATE decision_tracking SET outcome_score = ?, outcome_assessed_at = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(outcome_score)
        .bind(now)
        .bind(DecisionStatus::Assessed.as_str())
        .bind(now)
        .bind(decision_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// Increments `reversal_count`, transitions to `reversed`, and appends
    /// `reason` to `lessons_learned` (delimited by `"; "`).
    pub async fn mark_reversed(&self, decision_id: &str, reason: &str) -> AnalyticsResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let row = sqlx::query("SELECT lessons_learned FROM decision_tracking WHERE id = ?")
            .bind(decision_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        let existing_text = row.and_then(|r| r.try_get::<Option<String>, _>("lessons_learned").ok().flatten());
        let existing = sequence_from_storage_text(existing_text.as_deref());
        // `lessons_learned` is one growing blob, concatenated with "; " on
        // every reversal rather than appended as a new array element.
        let appended = match existing.first() {
            Some(prior) if !prior.is_empty() => format!("{prior}; {reason}"),
            _ => reason.to_string(),
        };

        sqlx::query(
            "UPDATE decision_tracking SET reversal_count = reversal_count + 1, status = ?, lessons_learned = ?, updated_at = ? WHERE id = ?",
        )
        .bind(DecisionStatus::Reversed.as_str())
        .bind(sequence_to_storage_text(&[appended]))
        .bind(now)
        .bind(decision_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        debug!(decision_id, reason, "marked decision reversed");
        Ok(())
    }

    async fn decisions_in_range(&self, range: TimeRange) -> AnalyticsResult<Vec<DecisionTracking>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT * FROM decision_tracking WHERE decision_made_at BETWEEN ? AND ? ORDER BY decision_made_at",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.iter().map(row_to_decision).collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    /// Counts, averages, time-to-decision/implementation in hours,
    /// reversal rate, top success factors, common pitfalls, and weekly
    /// velocity over `range`.
    pub async fn decision_analysis(&self, range: TimeRange) -> AnalyticsResult<DecisionAnalysis> {
        let decisions = self.decisions_in_range(range).await?;
        if decisions.is_empty() {
            return Ok(DecisionAnalysis::default());
        }

        let outcome_scores: Vec<f64> = decisions.iter().filter_map(|d| d.outcome_score).collect();
        let time_to_decision: Vec<f64> = decisions
            .iter()
            .filter_map(|d| match (d.lifecycle.problem_identified_at, d.lifecycle.decision_made_at) {
                (Some(p), Some(m)) => Some((m - p) as f64 / 3_600_000.0),
                _ => None,
            })
            .collect();
        let time_to_implementation: Vec<f64> = decisions
            .iter()
            .filter_map(|d| match (d.lifecycle.decision_made_at, d.lifecycle.implementation_started_at) {
                (Some(m), Some(i)) => Some((i - m) as f64 / 3_600_000.0),
                _ => None,
            })
            .collect();

        let reversed = decisions.iter().filter(|d| d.status == DecisionStatus::Reversed).count();
        let reversal_rate = reversed as f64 / decisions.len() as f64 * 100.0;

        let mut success_counts: HashMap<String, u32> = HashMap::new();
        for d in decisions.iter().filter(|d| d.outcome_score.unwrap_or(0.0) >= 70.0) {
            for f in &d.success_factors {
                *success_counts.entry(f.clone()).or_insert(0) += 1;
            }
        }
        let mut pitfall_counts: HashMap<String, u32> = HashMap::new();
        for d in decisions.iter().filter(|d| d.outcome_score.unwrap_or(100.0) < 50.0 || d.reversal_count > 0) {
            for f in &d.failure_factors {
                *pitfall_counts.entry(f.clone()).or_insert(0) += 1;
            }
        }

        let mut top_success_factors: Vec<(String, u32)> = success_counts.into_iter().collect();
        top_success_factors.sort_by(|a, b| b.1.cmp(&a.1));
        let mut common_pitfalls: Vec<(String, u32)> = pitfall_counts.into_iter().collect();
        common_pitfalls.sort_by(|a, b| b.1.cmp(&a.1));

        let weeks = (range.duration_ms() as f64 / (7.0 * 86_400_000.0)).max(1.0 / 7.0);
        let weekly_velocity = decisions.len() as f64 / weeks;

        Ok(DecisionAnalysis {
            total_decisions: decisions.len() as u32,
            average_outcome_score: math::mean(&outcome_scores).unwrap_or(0.0),
            average_time_to_decision_hours: math::mean(&time_to_decision).unwrap_or(0.0),
            average_time_to_implementation_hours: math::mean(&time_to_implementation).unwrap_or(0.0),
            reversal_rate,
            top_success_factors,
            common_pitfalls,
            weekly_velocity,
        })
    }

    /// `decision_analysis`'s shape, grouped by `decision_type` instead of
    /// aggregated.
    pub async fn decision_patterns(&self, range: TimeRange) -> AnalyticsResult<Vec<DecisionPattern>> {
        let decisions = self.decisions_in_range(range).await?;
        let mut groups: HashMap<DecisionType, Vec<&DecisionTracking>> = HashMap::new();
        for d in &decisions {
            if let Some(t) = d.decision_type {
                groups.entry(t).or_default().push(d);
            }
        }
        Ok(groups
            .into_iter()
            .map(|(decision_type, items)| {
                let scores: Vec<f64> = items.iter().filter_map(|d| d.outcome_score).collect();
                let reversed = items.iter().filter(|d| d.status == DecisionStatus::Reversed).count();
                DecisionPattern {
                    decision_type,
                    count: items.len() as u32,
                    average_outcome_score: math::mean(&scores).unwrap_or(0.0),
                    reversal_rate: reversed as f64 / items.len().max(1) as f64 * 100.0,
                }
            })
            .collect())
    }

    /// `status in {decided, implemented}` older than `days_old` with no
    /// recorded outcome.
    pub async fn decisions_needing_follow_up(&self, days_old: u32) -> AnalyticsResult<Vec<DecisionTracking>> {
        let cutoff = chrono::Utc::now().timestamp_millis() - (days_old as i64) * 86_400_000;
        let rows = sqlx::query(
            r#"SELECT * FROM decision_tracking
               WHERE status IN ('decided', 'implemented') AND outcome_score IS NULL AND decision_made_at < ?
               ORDER BY decision_made_at"#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.iter().map(row_to_decision).collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    /// Batch-saves decisions, one transaction per `batch_size` chunk.
    pub async fn batch_track_decisions(&self, records: &[DecisionTracking], options: BatchOptions) -> AnalyticsResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for chunk in crate::batch::chunked(records, options.batch_size) {
            let mut failed_in_chunk = 0usize;
            for record in chunk {
                match self.save_decision(record).await {
                    Ok(_) => outcome.inserted += 1,
                    Err(e) => {
                        failed_in_chunk += 1;
                        outcome.failed += 1;
                        outcome.errors.push(e.to_string());
                    }
                }
            }
            if crate::batch::should_abort(options.enable_rollback, failed_in_chunk, chunk.len()) {
                break;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(decision_made_at: i64) -> DecisionTracking {
        DecisionTracking {
            id: None,
            decision_summary: "use postgres".into(),
            decision_type: Some(DecisionType::Operational),
            conversation_ids: vec!["c1".into()],
            lifecycle: DecisionLifecycle {
                problem_identified_at: Some(decision_made_at - 3_600_000),
                options_considered_at: Some(decision_made_at - 1_800_000),
                decision_made_at: Some(decision_made_at),
                implementation_started_at: Some(decision_made_at + 3_600_000),
                outcome_assessed_at: None,
            },
            clarity_score: 80.0,
            confidence_level: 75.0,
            consensus_level: 60.0,
            reversal_count: 0,
            modification_count: 0,
            outcome_score: None,
            information_completeness: 70.0,
            stakeholder_count: 2,
            alternatives_considered: 1,
            risk_assessed: true,
            success_factors: vec!["good data".into()],
            failure_factors: Vec::new(),
            lessons_learned: Vec::new(),
            tags: vec!["database".into()],
            priority: Priority::High,
            status: DecisionStatus::Pending,
        }
    }

    #[tokio::test]
    async fn save_decision_sets_decided_status() {
        let db = Database::new_in_memory().await.unwrap();
        let id = db.save_decision(&sample(10_000)).await.unwrap();
        let decisions = db.decisions_in_range(TimeRange { start: 0, end: 20_000 }).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].status, DecisionStatus::Decided);
        assert_eq!(decisions[0].id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn mark_reversed_appends_reason_and_increments_count() {
        let db = Database::new_in_memory().await.unwrap();
        let id = db.save_decision(&sample(10_000)).await.unwrap();
        db.mark_reversed(&id, "rollback due to latency").await.unwrap();
        db.mark_reversed(&id, "config mismatch in prod").await.unwrap();

        let decisions = db.decisions_in_range(TimeRange { start: 0, end: 20_000 }).await.unwrap();
        let d = &decisions[0];
        assert_eq!(d.reversal_count, 2);
        assert_eq!(d.status, DecisionStatus::Reversed);
        assert!(d.lessons_learned[0].contains("rollback due to latency; config mismatch in prod"));
    }

    #[tokio::test]
    async fn decision_analysis_computes_reversal_rate() {
        let db = Database::new_in_memory().await.unwrap();
        let id1 = db.save_decision(&sample(10_000)).await.unwrap();
        db.save_decision(&sample(20_000)).await.unwrap();
        db.mark_reversed(&id1, "bad call").await.unwrap();

        let analysis = db.decision_analysis(TimeRange { start: 0, end: 30_000 }).await.unwrap();
        assert_eq!(analysis.total_decisions, 2);
        assert_eq!(analysis.reversal_rate, 50.0);
    }

    #[tokio::test]
    async fn decisions_needing_follow_up_excludes_assessed() {
        let db = Database::new_in_memory().await.unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        let old_decision_time = now - 10 * 86_400_000;
        let id = db.save_decision(&sample(old_decision_time)).await.unwrap();

        let follow_ups = db.decisions_needing_follow_up(5).await.unwrap();
        assert_eq!(follow_ups.len(), 1);

        db.update_outcome(&id, 90.0).await.unwrap();
        let follow_ups = db.decisions_needing_follow_up(5).await.unwrap();
        assert!(follow_ups.is_empty());
    }
}
