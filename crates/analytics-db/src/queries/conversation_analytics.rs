// crates/analytics-db/src/queries/conversation_analytics.rs
use crate::error::classify;
use crate::{BatchOptions, BatchOutcome, ConflictPolicy, Database};
use analytics_core::{math, AnalyticsError, AnalyticsResult};
use analytics_types::{AttributeBag, ConversationAnalytics, TimeRange};
use sqlx::Row;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductivitySummary {
    pub total_conversations: u32,
    pub average_productivity: f64,
    pub median_productivity: f64,
    pub trend: f64,
    pub total_insights: u32,
    pub average_depth: f64,
    pub average_circularity: f64,
    pub total_topic_transitions: u32,
}

fn row_to_analytics(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationAnalytics, sqlx::Error> {
    Ok(ConversationAnalytics {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        analyzed_at: row.try_get("analyzed_at")?,
        topic_count: row.try_get::<i64, _>("topic_count")? as u32,
        topic_transitions: row.try_get::<i64, _>("topic_transitions")? as u32,
        depth_score: row.try_get("depth_score")?,
        circularity_index: row.try_get("circularity_index")?,
        productivity_score: row.try_get("productivity_score")?,
        resolution_time: row.try_get("resolution_time")?,
        insight_count: row.try_get::<i64, _>("insight_count")? as u32,
        breakthrough_count: row.try_get::<i64, _>("breakthrough_count")? as u32,
        question_quality_avg: row.try_get("question_quality_avg")?,
        response_quality_avg: row.try_get("response_quality_avg")?,
        engagement_score: row.try_get("engagement_score")?,
        metadata: AttributeBag::from_storage_text(row.try_get::<Option<String>, _>("metadata")?.as_deref()),
    })
}

impl Database {
    /// Inserts a new analysis row, stamping `analyzed_at = now`. Analysis
    /// is append-only: the latest row per conversation is authoritative.
    pub async fn save_conversation_analytics(&self, analytics: &ConversationAnalytics) -> AnalyticsResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        let analytics = analytics.clone().clamped();
        sqlx::query(
            r#"INSERT INTO conversation_analytics
               (id, conversation_id, analyzed_at, topic_count, topic_transitions, depth_score,
                circularity_index, productivity_score, resolution_time, insight_count,
                breakthrough_count, question_quality_avg, response_quality_avg, engagement_score,
                metadata, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&analytics.conversation_id)
        .bind(analytics.analyzed_at)
        .bind(analytics.topic_count as i64)
        .bind(analytics.topic_transitions as i64)
        .bind(analytics.depth_score)
        .bind(analytics.circularity_index)
        .bind(analytics.productivity_score)
        .bind(analytics.resolution_time)
        .bind(analytics.insight_count as i64)
        .bind(analytics.breakthrough_count as i64)
        .bind(analytics.question_quality_avg)
        .bind(analytics.response_quality_avg)
        .bind(analytics.engagement_score)
        .bind(analytics.metadata.to_storage_text())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        debug!(conversation_id = %analytics.conversation_id, %id, "saved conversation analytics");
        Ok(id)
    }

    /// The latest analysis row for a conversation, if any.
    pub async fn get_conversation_analytics(&self, conversation_id: &str) -> AnalyticsResult<Option<ConversationAnalytics>> {
        let row = sqlx::query(
            r#"SELECT * FROM conversation_analytics
               WHERE conversation_id = ?
               ORDER BY analyzed_at DESC LIMIT 1"#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        row.as_ref().map(row_to_analytics).transpose().map_err(classify)
    }

    /// The latest `analyzed_at` for each of `conversation_ids`, used by
    /// the engine's incremental-scan predicate.
    pub async fn latest_analyzed_at(&self, conversation_ids: &[String]) -> AnalyticsResult<std::collections::HashMap<String, i64>> {
        if conversation_ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let placeholders = std::iter::repeat("?").take(conversation_ids.len()).collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT conversation_id, MAX(analyzed_at) as analyzed_at FROM conversation_analytics \
             WHERE conversation_id IN ({placeholders}) GROUP BY conversation_id"
        );
        let mut query = sqlx::query(&sql);
        for id in conversation_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(classify)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("conversation_id"), r.get::<i64, _>("analyzed_at")))
            .collect())
    }

    /// Productivity aggregates over the *latest* row per conversation
    /// within `range`. Trend is OLS slope of productivity vs analyzed
    /// time in seconds; median is the 50th percentile of latest scores.
    pub async fn productivity_summary(&self, range: TimeRange) -> AnalyticsResult<ProductivitySummary> {
        if range.is_empty() {
            return Ok(ProductivitySummary {
                total_conversations: 0,
                average_productivity: 0.0,
                median_productivity: 0.0,
                trend: 0.0,
                total_insights: 0,
                average_depth: 0.0,
                average_circularity: 0.0,
                total_topic_transitions: 0,
            });
        }
        let rows = sqlx::query(
            r#"SELECT conversation_id, analyzed_at, productivity_score, insight_count, depth_score, circularity_index, topic_transitions
               FROM conversation_analytics a
               WHERE analyzed_at = (
                   SELECT MAX(analyzed_at) FROM conversation_analytics b WHERE b.conversation_id = a.conversation_id
               ) AND analyzed_at BETWEEN ? AND ?"#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        if rows.is_empty() {
            return Ok(ProductivitySummary {
                total_conversations: 0,
                average_productivity: 0.0,
                median_productivity: 0.0,
                trend: 0.0,
                total_insights: 0,
                average_depth: 0.0,
                average_circularity: 0.0,
                total_topic_transitions: 0,
            });
        }

        let scores: Vec<f64> = rows.iter().map(|r| r.get::<f64, _>("productivity_score")).collect();
        let depths: Vec<f64> = rows.iter().map(|r| r.get::<f64, _>("depth_score")).collect();
        let circularities: Vec<f64> = rows.iter().map(|r| r.get::<f64, _>("circularity_index")).collect();
        let total_insights: u32 = rows.iter().map(|r| r.get::<i64, _>("insight_count") as u32).sum();
        let total_topic_transitions: u32 = rows.iter().map(|r| r.get::<i64, _>("topic_transitions") as u32).sum();
        let points: Vec<(f64, f64)> =
            rows.iter().map(|r| (r.get::<i64, _>("analyzed_at") as f64 / 1000.0, r.get::<f64, _>("productivity_score"))).collect();

        Ok(ProductivitySummary {
            total_conversations: rows.len() as u32,
            average_productivity: math::mean(&scores).unwrap_or(0.0),
            median_productivity: math::median(&scores).unwrap_or(0.0),
            trend: math::trend_slope(&points),
            total_insights,
            average_depth: math::mean(&depths).unwrap_or(0.0),
            average_circularity: math::mean(&circularities).unwrap_or(0.0),
            total_topic_transitions,
        })
    }

    /// Latest rows ordered by `(productivity_score desc, insight_count desc)`.
    pub async fn top_performing(&self, limit: u32, range: TimeRange) -> AnalyticsResult<Vec<ConversationAnalytics>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"SELECT * FROM conversation_analytics a
               WHERE analyzed_at = (
                   SELECT MAX(analyzed_at) FROM conversation_analytics b WHERE b.conversation_id = a.conversation_id
               ) AND analyzed_at BETWEEN ? AND ?
               ORDER BY productivity_score DESC, insight_count DESC
               LIMIT ?"#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.iter().map(row_to_analytics).collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    /// Batch-inserts conversation analytics rows inside a single
    /// transaction, chunked per `options.batch_size`.
    pub async fn batch_save_conversation_analytics(
        &self,
        records: &[ConversationAnalytics],
        options: BatchOptions,
    ) -> AnalyticsResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let now = chrono::Utc::now().timestamp_millis();

        for chunk in crate::batch::chunked(records, options.batch_size) {
            let mut tx = self.pool.begin().await.map_err(classify)?;
            let mut failed_in_chunk = 0usize;

            for record in chunk {
                let id = uuid::Uuid::new_v4().to_string();
                let record = record.clone().clamped();
                let or_clause = match options.conflict {
                    ConflictPolicy::Ignore => "OR IGNORE",
                    ConflictPolicy::Replace => "OR REPLACE",
                    ConflictPolicy::Fail => "",
                };
                let sql = format!(
                    "INSERT {or_clause} INTO conversation_analytics \
                     (id, conversation_id, analyzed_at, topic_count, topic_transitions, depth_score, \
                      circularity_index, productivity_score, resolution_time, insight_count, \
                      breakthrough_count, question_quality_avg, response_quality_avg, engagement_score, \
                      metadata, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                );
                let result = sqlx::query(&sql)
                    .bind(&id)
                    .bind(&record.conversation_id)
                    .bind(record.analyzed_at)
                    .bind(record.topic_count as i64)
                    .bind(record.topic_transitions as i64)
                    .bind(record.depth_score)
                    .bind(record.circularity_index)
                    .bind(record.productivity_score)
                    .bind(record.resolution_time)
                    .bind(record.insight_count as i64)
                    .bind(record.breakthrough_count as i64)
                    .bind(record.question_quality_avg)
                    .bind(record.response_quality_avg)
                    .bind(record.engagement_score)
                    .bind(record.metadata.to_storage_text())
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await;

                match result {
                    Ok(res) if res.rows_affected() > 0 => outcome.inserted += 1,
                    Ok(_) => {}
                    Err(e) => {
                        failed_in_chunk += 1;
                        outcome.failed += 1;
                        outcome.errors.push(classify(e).to_string());
                        if options.conflict == ConflictPolicy::Fail {
                            break;
                        }
                    }
                }
            }

            if crate::batch::should_abort(options.enable_rollback, failed_in_chunk, chunk.len()) {
                warn!(failed_in_chunk, chunk_len = chunk.len(), "aborting conversation analytics batch chunk");
                tx.rollback().await.map_err(classify)?;
                return Err(AnalyticsError::PartialFailure { failed: outcome.failed, total: records.len() });
            }
            tx.commit().await.map_err(classify)?;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_types::AttributeBag;

    fn sample(conversation_id: &str, analyzed_at: i64, productivity: f64) -> ConversationAnalytics {
        ConversationAnalytics {
            id: None,
            conversation_id: conversation_id.into(),
            analyzed_at,
            topic_count: 3,
            topic_transitions: 2,
            depth_score: 60.0,
            circularity_index: 0.2,
            productivity_score: productivity,
            resolution_time: Some(1000),
            insight_count: 2,
            breakthrough_count: 1,
            question_quality_avg: 70.0,
            response_quality_avg: 80.0,
            engagement_score: 75.0,
            metadata: AttributeBag::new(),
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trips_latest_row() {
        let db = Database::new_in_memory().await.unwrap();
        db.save_conversation_analytics(&sample("c1", 1000, 50.0)).await.unwrap();
        db.save_conversation_analytics(&sample("c1", 2000, 80.0)).await.unwrap();

        let latest = db.get_conversation_analytics("c1").await.unwrap().unwrap();
        assert_eq!(latest.analyzed_at, 2000);
        assert_eq!(latest.productivity_score, 80.0);
    }

    #[tokio::test]
    async fn productivity_summary_aggregates_latest_rows_only() {
        let db = Database::new_in_memory().await.unwrap();
        db.save_conversation_analytics(&sample("c1", 1000, 40.0)).await.unwrap();
        db.save_conversation_analytics(&sample("c1", 2000, 60.0)).await.unwrap();
        db.save_conversation_analytics(&sample("c2", 1500, 80.0)).await.unwrap();

        let summary = db.productivity_summary(TimeRange { start: 0, end: 5000 }).await.unwrap();
        assert_eq!(summary.total_conversations, 2);
        assert_eq!(summary.average_productivity, 70.0);
        assert_eq!(summary.total_topic_transitions, 4);
    }

    #[tokio::test]
    async fn top_performing_orders_by_productivity_then_insights() {
        let db = Database::new_in_memory().await.unwrap();
        db.save_conversation_analytics(&sample("c1", 1000, 40.0)).await.unwrap();
        db.save_conversation_analytics(&sample("c2", 1000, 90.0)).await.unwrap();

        let top = db.top_performing(10, TimeRange { start: 0, end: 5000 }).await.unwrap();
        assert_eq!(top[0].conversation_id, "c2");
    }

    #[tokio::test]
    async fn batch_save_inserts_every_record() {
        let db = Database::new_in_memory().await.unwrap();
        let records = vec![sample("c1", 1000, 10.0), sample("c2", 1000, 20.0), sample("c3", 1000, 30.0)];
        let outcome = db.batch_save_conversation_analytics(&records, BatchOptions::default()).await.unwrap();
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.failed, 0);
    }
}
