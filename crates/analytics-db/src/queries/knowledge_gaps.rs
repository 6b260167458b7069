// crates/analytics-db/src/queries/knowledge_gaps.rs
use crate::error::classify;
use crate::{BatchOptions, BatchOutcome, ConflictPolicy, Database};
use analytics_core::{math, AnalyticsResult};
use analytics_types::{sequence_from_storage_text, sequence_to_storage_text, GapType, KnowledgeGap, Priority, TimeRange};
use sqlx::Row;
use std::collections::HashMap;
use tracing::debug;

const SUBSTRING_MATCH_MIN_LEN: usize = 10;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct GapCluster {
    pub gap_ids: Vec<String>,
    pub total_frequency: u32,
    pub average_exploration_depth: f64,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearningProgress {
    pub gap_id: String,
    /// `(analyzed_at, understanding level 0-100)`, chronological.
    pub points: Vec<(i64, f64)>,
    pub gradient_per_day: f64,
    pub plateaued: bool,
    pub estimated_completion_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicCoverage {
    pub gap_type: GapType,
    pub resolved: u32,
    pub unresolved: u32,
    pub resolution_rate: f64,
}

fn cluster_priority(total_frequency: u32, average_exploration_depth: f64) -> Priority {
    if total_frequency >= 10 && average_exploration_depth < 30.0 {
        Priority::Critical
    } else if total_frequency >= 5 && average_exploration_depth < 50.0 {
        Priority::High
    } else if total_frequency >= 3 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn row_to_gap(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeGap, sqlx::Error> {
    let gap_type_str: String = row.try_get("gap_type")?;
    Ok(KnowledgeGap {
        id: row.try_get("id")?,
        gap_type: GapType::parse(&gap_type_str).unwrap_or(GapType::Topic),
        content: row.try_get("content")?,
        normalized_content: row.try_get("normalized_content")?,
        frequency: row.try_get::<i64, _>("frequency")? as u32,
        first_occurrence: row.try_get("first_occurrence")?,
        last_occurrence: row.try_get("last_occurrence")?,
        exploration_depth: row.try_get("exploration_depth")?,
        resolved: row.try_get::<i64, _>("resolved")? != 0,
        resolution_conversation_id: row.try_get("resolution_conversation_id")?,
        resolution_date: row.try_get("resolution_date")?,
        resolution_quality: row.try_get("resolution_quality")?,
        related_entities: sequence_from_storage_text(row.try_get::<Option<String>, _>("related_entities")?.as_deref()),
        related_gaps: sequence_from_storage_text(row.try_get::<Option<String>, _>("related_gaps")?.as_deref()),
        suggested_actions: sequence_from_storage_text(row.try_get::<Option<String>, _>("suggested_actions")?.as_deref()),
        suggested_resources: sequence_from_storage_text(row.try_get::<Option<String>, _>("suggested_resources")?.as_deref()),
    })
}

impl Database {
    /// Dedup invariant: looks up an existing gap by normalized content
    /// (exact match, or substring match when the normalized content
    /// exceeds 10 characters). On hit, bumps `frequency`/`last_occurrence`
    /// in place and returns the existing id; on miss, inserts a new row.
    pub async fn save_gap(&self, input: &KnowledgeGap, conversation_id: &str) -> AnalyticsResult<String> {
        let existing = self.find_matching_gap(&input.normalized_content, input.gap_type).await?;
        let now = chrono::Utc::now().timestamp_millis();

        let id = if let Some(existing_id) = existing {
            sqlx::query(
                "UPDATE knowledge_gaps SET frequency = frequency + ?, last_occurrence = MAX(last_occurrence, ?), updated_at = ? WHERE id = ?",
            )
            .bind(input.frequency as i64)
            .bind(input.last_occurrence)
            .bind(now)
            .bind(&existing_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
            existing_id
        } else {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                r#"INSERT INTO knowledge_gaps
                   (id, gap_type, content, normalized_content, frequency, first_occurrence, last_occurrence,
                    exploration_depth, resolved, resolution_conversation_id, resolution_date, resolution_quality,
                    related_entities, related_gaps, suggested_actions, suggested_resources, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, NULL, NULL, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(input.gap_type.as_str())
            .bind(&input.content)
            .bind(&input.normalized_content)
            .bind(input.frequency as i64)
            .bind(input.first_occurrence)
            .bind(input.last_occurrence)
            .bind(input.exploration_depth)
            .bind(sequence_to_storage_text(&input.related_entities))
            .bind(sequence_to_storage_text(&input.related_gaps))
            .bind(sequence_to_storage_text(&input.suggested_actions))
            .bind(sequence_to_storage_text(&input.suggested_resources))
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
            id
        };

        sqlx::query("INSERT OR IGNORE INTO gap_conversations (gap_id, conversation_id, occurred_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(conversation_id)
            .bind(input.last_occurrence)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        debug!(gap_id = %id, conversation_id, "saved knowledge gap");
        Ok(id)
    }

    async fn find_matching_gap(&self, normalized_content: &str, gap_type: GapType) -> AnalyticsResult<Option<String>> {
        let row = sqlx::query("SELECT id FROM knowledge_gaps WHERE normalized_content = ? AND gap_type = ?")
            .bind(normalized_content)
            .bind(gap_type.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        if let Some(row) = row {
            return Ok(Some(row.get("id")));
        }
        if normalized_content.len() <= SUBSTRING_MATCH_MIN_LEN {
            return Ok(None);
        }
        let candidates: Vec<(String, String)> = sqlx::query_as("SELECT id, normalized_content FROM knowledge_gaps WHERE gap_type = ?")
            .bind(gap_type.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(candidates
            .into_iter()
            .find(|(_, existing)| existing.contains(normalized_content) || normalized_content.contains(existing.as_str()))
            .map(|(id, _)| id))
    }

    /// Groups the incoming batch by normalized content first (summing
    /// frequencies, min/max occurrence timestamps, unioning sequence
    /// fields), then upserts on `(normalized_content, gap_type)` when
    /// `conflict = Replace` (update-in-place); otherwise each merged
    /// group is inserted independently.
    pub async fn batch_save_gaps(
        &self,
        records: &[KnowledgeGap],
        conversation_id: &str,
        options: BatchOptions,
    ) -> AnalyticsResult<BatchOutcome> {
        let mut groups: HashMap<(String, GapType), KnowledgeGap> = HashMap::new();
        for record in records {
            let key = (record.normalized_content.clone(), record.gap_type);
            groups
                .entry(key)
                .and_modify(|g| {
                    g.frequency += record.frequency;
                    g.first_occurrence = g.first_occurrence.min(record.first_occurrence);
                    g.last_occurrence = g.last_occurrence.max(record.last_occurrence);
                    for e in &record.related_entities {
                        if !g.related_entities.contains(e) {
                            g.related_entities.push(e.clone());
                        }
                    }
                })
                .or_insert_with(|| record.clone());
        }

        let mut outcome = BatchOutcome::default();
        for (_, merged) in groups {
            match options.conflict {
                ConflictPolicy::Fail if self.find_matching_gap(&merged.normalized_content, merged.gap_type).await?.is_some() => {
                    outcome.failed += 1;
                    outcome.errors.push(format!("gap already exists: {}", merged.normalized_content));
                }
                _ => match self.save_gap(&merged, conversation_id).await {
                    Ok(_) => outcome.updated += 1,
                    Err(e) => {
                        outcome.failed += 1;
                        outcome.errors.push(e.to_string());
                    }
                },
            }
        }
        Ok(outcome)
    }

    /// Persists gaps discovered across a batch of conversations in one
    /// call — each `(conversation_id, gaps)` pair is forwarded to
    /// `batch_save_gaps`, the outcome counts accumulated across all of
    /// them. Used by the Batch Processor's Gaps phase.
    pub async fn batch_process_gaps_from_conversations(
        &self,
        gaps_by_conversation: &[(String, Vec<KnowledgeGap>)],
        options: BatchOptions,
    ) -> AnalyticsResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for (conversation_id, gaps) in gaps_by_conversation {
            if gaps.is_empty() {
                continue;
            }
            let chunk_outcome = self.batch_save_gaps(gaps, conversation_id, options).await?;
            outcome.inserted += chunk_outcome.inserted;
            outcome.updated += chunk_outcome.updated;
            outcome.failed += chunk_outcome.failed;
            outcome.errors.extend(chunk_outcome.errors);
        }
        Ok(outcome)
    }

    pub async fn get_unresolved_gaps(&self, limit: u32) -> AnalyticsResult<Vec<KnowledgeGap>> {
        let rows = sqlx::query("SELECT * FROM knowledge_gaps WHERE resolved = 0 ORDER BY last_occurrence DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(row_to_gap).collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    /// Buckets every unresolved gap by priority, derived per-gap from the
    /// same `frequency`/`exploration_depth` thresholds used for clusters.
    pub async fn gaps_by_priority(&self) -> AnalyticsResult<HashMap<Priority, Vec<KnowledgeGap>>> {
        let gaps = self.get_unresolved_gaps(u32::MAX).await?;
        let mut buckets: HashMap<Priority, Vec<KnowledgeGap>> = HashMap::new();
        for gap in gaps {
            let priority = cluster_priority(gap.frequency, gap.exploration_depth);
            buckets.entry(priority).or_default().push(gap);
        }
        Ok(buckets)
    }

    pub async fn mark_resolved(
        &self,
        gap_id: &str,
        resolution_conversation_id: &str,
        resolution_quality: f64,
    ) -> AnalyticsResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "UPDATE knowledge_gaps SET resolved = 1, resolution_conversation_id = ?, resolution_date = ?, resolution_quality = ?, updated_at = ? WHERE id = ?",
        )
        .bind(resolution_conversation_id)
        .bind(now)
        .bind(resolution_quality)
        .bind(now)
        .bind(gap_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        debug!(gap_id, resolution_conversation_id, "marked gap resolved");
        Ok(())
    }

    /// Examines unresolved gaps in insertion order; for each unprocessed
    /// gap, absorbs every subsequent unprocessed gap whose Jaccard
    /// similarity over normalized-content word sets is >= threshold.
    /// Clusters smaller than `min_size` are discarded.
    pub async fn gap_clusters(&self, min_size: usize, similarity_threshold: Option<f64>) -> AnalyticsResult<Vec<GapCluster>> {
        let threshold = similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        let rows = sqlx::query("SELECT * FROM knowledge_gaps WHERE resolved = 0 ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        let gaps = rows.iter().map(row_to_gap).collect::<Result<Vec<_>, _>>().map_err(classify)?;

        let mut processed = vec![false; gaps.len()];
        let mut clusters = Vec::new();
        for i in 0..gaps.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;
            let mut members = vec![i];
            for j in (i + 1)..gaps.len() {
                if processed[j] {
                    continue;
                }
                if math::jaccard_similarity(&gaps[i].normalized_content, &gaps[j].normalized_content) >= threshold {
                    processed[j] = true;
                    members.push(j);
                }
            }
            if members.len() < min_size {
                continue;
            }
            let total_frequency: u32 = members.iter().map(|&m| gaps[m].frequency).sum();
            let average_exploration_depth =
                members.iter().map(|&m| gaps[m].exploration_depth).sum::<f64>() / members.len() as f64;
            clusters.push(GapCluster {
                gap_ids: members.iter().filter_map(|&m| gaps[m].id.clone()).collect(),
                total_frequency,
                average_exploration_depth,
                priority: cluster_priority(total_frequency, average_exploration_depth),
            });
        }
        Ok(clusters)
    }

    /// Progress points from `conversation_analytics` rows of conversations
    /// linked (via `gap_conversations`) to this gap. Understanding level
    /// is bucketed from depth and insight count; gradient is the OLS
    /// slope of (timestamp, level) in points-per-day; plateau is declared
    /// when the average delta across the last three points is under 2.
    pub async fn learning_progress(&self, gap_id: &str) -> AnalyticsResult<LearningProgress> {
        let rows = sqlx::query(
            r#"SELECT a.analyzed_at as analyzed_at, a.depth_score as depth_score, a.insight_count as insight_count
               FROM conversation_analytics a
               JOIN gap_conversations gc ON gc.conversation_id = a.conversation_id
               WHERE gc.gap_id = ?
               ORDER BY a.analyzed_at"#,
        )
        .bind(gap_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let points: Vec<(i64, f64)> = rows
            .iter()
            .map(|r| {
                let depth: f64 = r.get("depth_score");
                let insight_count: i64 = r.get("insight_count");
                let level = if insight_count > 0 && depth > 70.0 {
                    85.0
                } else if depth > 60.0 {
                    70.0
                } else if depth > 40.0 {
                    55.0
                } else if depth > 20.0 {
                    35.0
                } else {
                    15.0
                };
                (r.get::<i64, _>("analyzed_at"), level)
            })
            .collect();

        let gradient_points: Vec<(f64, f64)> = points.iter().map(|(t, l)| (*t as f64 / 86_400_000.0, *l)).collect();
        let gradient_per_day = math::trend_slope(&gradient_points);

        let plateaued = if points.len() >= 3 {
            let last_three = &points[points.len() - 3..];
            let deltas: Vec<f64> = last_three.windows(2).map(|w| (w[1].1 - w[0].1).abs()).collect();
            math::mean(&deltas).unwrap_or(0.0) < 2.0
        } else {
            false
        };

        let current = points.last().map(|(_, l)| *l).unwrap_or(0.0);
        let estimated_completion_hours = if gradient_per_day > 0.0 && current < 85.0 {
            Some((((85.0 - current) / gradient_per_day) * 24.0).min(720.0))
        } else {
            None
        };

        Ok(LearningProgress { gap_id: gap_id.to_string(), points, gradient_per_day, plateaued, estimated_completion_hours })
    }

    /// Per-`gap_type` resolved/unresolved counts and resolution rate over
    /// gaps whose `last_occurrence` falls in `range`.
    pub async fn topic_coverage(&self, range: TimeRange) -> AnalyticsResult<Vec<TopicCoverage>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"SELECT gap_type,
                      SUM(CASE WHEN resolved = 1 THEN 1 ELSE 0 END) as resolved_count,
                      SUM(CASE WHEN resolved = 0 THEN 1 ELSE 0 END) as unresolved_count
               FROM knowledge_gaps
               WHERE last_occurrence BETWEEN ? AND ?
               GROUP BY gap_type"#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        Ok(rows
            .iter()
            .map(|r| {
                let resolved: i64 = r.get("resolved_count");
                let unresolved: i64 = r.get("unresolved_count");
                let total = resolved + unresolved;
                TopicCoverage {
                    gap_type: GapType::parse(&r.get::<String, _>("gap_type")).unwrap_or(GapType::Topic),
                    resolved: resolved as u32,
                    unresolved: unresolved as u32,
                    resolution_rate: if total == 0 { 0.0 } else { resolved as f64 / total as f64 },
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_gap(content: &str, gap_type: GapType, occurrence: i64) -> KnowledgeGap {
        KnowledgeGap {
            id: None,
            gap_type,
            content: content.into(),
            normalized_content: analytics_types::normalize_content(content),
            frequency: 1,
            first_occurrence: occurrence,
            last_occurrence: occurrence,
            exploration_depth: 40.0,
            resolved: false,
            resolution_conversation_id: None,
            resolution_date: None,
            resolution_quality: None,
            related_entities: Vec::new(),
            related_gaps: Vec::new(),
            suggested_actions: Vec::new(),
            suggested_resources: Vec::new(),
        }
    }

    #[tokio::test]
    async fn save_gap_deduplicates_exact_matches() {
        let db = Database::new_in_memory().await.unwrap();
        let id1 = db.save_gap(&sample_gap("how does sharding work", GapType::Question, 1000), "c1").await.unwrap();
        let id2 = db.save_gap(&sample_gap("how does sharding work", GapType::Question, 2000), "c2").await.unwrap();
        assert_eq!(id1, id2);

        let gaps = db.get_unresolved_gaps(10).await.unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].frequency, 2);
        assert_eq!(gaps[0].last_occurrence, 2000);
    }

    #[tokio::test]
    async fn mark_resolved_updates_flags() {
        let db = Database::new_in_memory().await.unwrap();
        let id = db.save_gap(&sample_gap("what is eventual consistency", GapType::Concept, 1000), "c1").await.unwrap();
        db.mark_resolved(&id, "c2", 90.0).await.unwrap();
        let gaps = db.get_unresolved_gaps(10).await.unwrap();
        assert!(gaps.is_empty());
    }

    #[tokio::test]
    async fn batch_process_gaps_from_conversations_accumulates_across_conversations() {
        let db = Database::new_in_memory().await.unwrap();
        let batch = vec![
            ("c1".to_string(), vec![sample_gap("how does sharding work", GapType::Question, 1000)]),
            ("c2".to_string(), vec![sample_gap("what is consensus", GapType::Concept, 2000)]),
        ];
        let outcome = db.batch_process_gaps_from_conversations(&batch, BatchOptions::default()).await.unwrap();
        assert_eq!(outcome.updated, 2);
        assert_eq!(db.get_unresolved_gaps(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn gap_clusters_groups_similar_content_and_discards_small_clusters() {
        let db = Database::new_in_memory().await.unwrap();
        db.save_gap(&sample_gap("database replication lag issue", GapType::Topic, 1000), "c1").await.unwrap();
        db.save_gap(&sample_gap("database replication lag problem", GapType::Topic, 2000), "c2").await.unwrap();
        db.save_gap(&sample_gap("totally unrelated onboarding question", GapType::Topic, 3000), "c3").await.unwrap();

        let clusters = db.gap_clusters(2, Some(0.5)).await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].gap_ids.len(), 2);
    }

    #[tokio::test]
    async fn topic_coverage_computes_resolution_rate() {
        let db = Database::new_in_memory().await.unwrap();
        let id = db.save_gap(&sample_gap("gap one", GapType::Topic, 1000), "c1").await.unwrap();
        db.save_gap(&sample_gap("gap two", GapType::Topic, 1000), "c1").await.unwrap();
        db.mark_resolved(&id, "c1", 80.0).await.unwrap();

        let coverage = db.topic_coverage(TimeRange { start: 0, end: 5000 }).await.unwrap();
        let topic = coverage.iter().find(|c| c.gap_type == GapType::Topic).unwrap();
        assert_eq!(topic.resolved, 1);
        assert_eq!(topic.unresolved, 1);
        assert_eq!(topic.resolution_rate, 0.5);
    }
}
