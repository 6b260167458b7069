// crates/analytics-db/src/queries/productivity_patterns.rs
use crate::error::classify;
use crate::Database;
use analytics_core::AnalyticsResult;
use analytics_types::{ProductivityPattern, TimeRange, WindowType};
use sqlx::Row;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakHours {
    pub hours: BTreeSet<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionLengthAnalysis {
    pub optimal_minutes: u32,
    pub average_minutes: f64,
    /// `(length bucket in minutes, sample count)` pairs, 15-minute buckets.
    pub distribution: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPatterns {
    pub window_start: i64,
    pub window_end: i64,
    pub message_count: u32,
    pub insight_count: u32,
    pub insight_rate: f64,
}

fn row_to_pattern(row: &sqlx::sqlite::SqliteRow) -> Result<ProductivityPattern, sqlx::Error> {
    let window_type_str: String = row.try_get("window_type")?;
    let peak_hours_text: Option<String> = row.try_get("peak_hours")?;
    let peak_hours: BTreeSet<u8> = peak_hours_text
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    Ok(ProductivityPattern {
        id: row.try_get("id")?,
        window_start: row.try_get("window_start")?,
        window_end: row.try_get("window_end")?,
        window_type: WindowType::parse(&window_type_str).unwrap_or(WindowType::Day),
        conversation_count: row.try_get::<i64, _>("conversation_count")? as u32,
        message_count: row.try_get::<i64, _>("message_count")? as u32,
        decision_count: row.try_get::<i64, _>("decision_count")? as u32,
        insight_count: row.try_get::<i64, _>("insight_count")? as u32,
        avg_productivity: row.try_get("avg_productivity")?,
        peak_productivity: row.try_get("peak_productivity")?,
        min_productivity: row.try_get("min_productivity")?,
        peak_hours,
        optimal_session_length: row.try_get::<i64, _>("optimal_session_length")? as u32,
        sample_size: row.try_get::<i64, _>("sample_size")? as u32,
        confidence_level: row.try_get("confidence_level")?,
    })
}

impl Database {
    /// Upserts on `(window_type, window_start)`.
    pub async fn upsert_productivity_pattern(&self, pattern: &ProductivityPattern) -> AnalyticsResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        let peak_hours_text = serde_json::to_string(&pattern.peak_hours).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"INSERT INTO productivity_patterns
               (id, window_start, window_end, window_type, conversation_count, message_count,
                decision_count, insight_count, avg_productivity, peak_productivity, min_productivity,
                peak_hours, optimal_session_length, sample_size, confidence_level, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(window_type, window_start) DO UPDATE SET
                 window_end = excluded.window_end,
                 conversation_count = excluded.conversation_count,
                 message_count = excluded.message_count,
                 decision_count = excluded.decision_count,
                 insight_count = excluded.insight_count,
                 avg_productivity = excluded.avg_productivity,
                 peak_productivity = excluded.peak_productivity,
                 min_productivity = excluded.min_productivity,
                 peak_hours = excluded.peak_hours,
                 optimal_session_length = excluded.optimal_session_length,
                 sample_size = excluded.sample_size,
                 confidence_level = excluded.confidence_level,
                 updated_at = excluded.updated_at"#,
        )
        .bind(&id)
        .bind(pattern.window_start)
        .bind(pattern.window_end)
        .bind(pattern.window_type.as_str())
        .bind(pattern.conversation_count as i64)
        .bind(pattern.message_count as i64)
        .bind(pattern.decision_count as i64)
        .bind(pattern.insight_count as i64)
        .bind(pattern.avg_productivity)
        .bind(pattern.peak_productivity)
        .bind(pattern.min_productivity)
        .bind(&peak_hours_text)
        .bind(pattern.optimal_session_length as i64)
        .bind(pattern.sample_size as i64)
        .bind(pattern.confidence_level)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        debug!(window_type = pattern.window_type.as_str(), window_start = pattern.window_start, "upserted productivity pattern");
        Ok(id)
    }

    pub async fn patterns_in_range(&self, range: TimeRange) -> AnalyticsResult<Vec<ProductivityPattern>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT * FROM productivity_patterns WHERE window_start <= ? AND window_end >= ? ORDER BY window_start",
        )
        .bind(range.end)
        .bind(range.start)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.iter().map(row_to_pattern).collect::<Result<Vec<_>, _>>().map_err(classify)
    }

    /// The union of every window's peak hours within `range`.
    pub async fn peak_hours(&self, range: TimeRange) -> AnalyticsResult<PeakHours> {
        let patterns = self.patterns_in_range(range).await?;
        let mut hours = BTreeSet::new();
        for p in patterns {
            hours.extend(p.peak_hours);
        }
        Ok(PeakHours { hours })
    }

    /// The length bucket (15-minute granularity) with the highest mean
    /// productivity, read off `optimal_session_length`/`avg_productivity`
    /// of the windows in range.
    pub async fn session_length_analysis(&self, range: TimeRange) -> AnalyticsResult<SessionLengthAnalysis> {
        let patterns = self.patterns_in_range(range).await?;
        if patterns.is_empty() {
            return Ok(SessionLengthAnalysis { optimal_minutes: 0, average_minutes: 0.0, distribution: Vec::new() });
        }

        let mut buckets: std::collections::BTreeMap<u32, (f64, u32)> = std::collections::BTreeMap::new();
        for p in &patterns {
            let bucket = (p.optimal_session_length / 15).max(1) * 15;
            let entry = buckets.entry(bucket).or_insert((0.0, 0));
            entry.0 += p.avg_productivity;
            entry.1 += 1;
        }

        let optimal_minutes = buckets
            .iter()
            .max_by(|a, b| (a.1 .0 / a.1 .1 as f64).partial_cmp(&(b.1 .0 / b.1 .1 as f64)).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(bucket, _)| *bucket)
            .unwrap_or(0);

        let average_minutes = patterns.iter().map(|p| p.optimal_session_length as f64).sum::<f64>() / patterns.len() as f64;
        let distribution = buckets.into_iter().map(|(bucket, (_, count))| (bucket, count)).collect();

        Ok(SessionLengthAnalysis { optimal_minutes, average_minutes, distribution })
    }

    /// Message/insight volume per window in range — a proxy for
    /// question-driven productivity until conversation-level question
    /// metrics are rolled into windowed patterns.
    pub async fn question_patterns(&self, range: TimeRange) -> AnalyticsResult<Vec<QuestionPatterns>> {
        let patterns = self.patterns_in_range(range).await?;
        Ok(patterns
            .into_iter()
            .map(|p| QuestionPatterns {
                window_start: p.window_start,
                window_end: p.window_end,
                message_count: p.message_count,
                insight_count: p.insight_count,
                insight_rate: if p.message_count == 0 { 0.0 } else { p.insight_count as f64 / p.message_count as f64 },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(window_start: i64, window_type: WindowType, avg_productivity: f64, optimal: u32) -> ProductivityPattern {
        ProductivityPattern {
            id: None,
            window_start,
            window_end: window_start + 3_600_000,
            window_type,
            conversation_count: 5,
            message_count: 40,
            decision_count: 2,
            insight_count: 8,
            avg_productivity,
            peak_productivity: avg_productivity + 10.0,
            min_productivity: avg_productivity - 10.0,
            peak_hours: [9u8, 10u8].into_iter().collect(),
            optimal_session_length: optimal,
            sample_size: 5,
            confidence_level: 0.8,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_window() {
        let db = Database::new_in_memory().await.unwrap();
        db.upsert_productivity_pattern(&sample(1000, WindowType::Hour, 50.0, 30)).await.unwrap();
        db.upsert_productivity_pattern(&sample(1000, WindowType::Hour, 70.0, 45)).await.unwrap();

        let patterns = db.patterns_in_range(TimeRange { start: 0, end: 1_000_000 }).await.unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].avg_productivity, 70.0);
    }

    #[tokio::test]
    async fn peak_hours_unions_across_windows() {
        let db = Database::new_in_memory().await.unwrap();
        db.upsert_productivity_pattern(&sample(1000, WindowType::Hour, 50.0, 30)).await.unwrap();
        let peak = db.peak_hours(TimeRange { start: 0, end: 1_000_000 }).await.unwrap();
        assert!(peak.hours.contains(&9));
    }

    #[tokio::test]
    async fn session_length_analysis_picks_highest_mean_bucket() {
        let db = Database::new_in_memory().await.unwrap();
        db.upsert_productivity_pattern(&sample(1000, WindowType::Hour, 30.0, 15)).await.unwrap();
        db.upsert_productivity_pattern(&sample(2000, WindowType::Hour, 90.0, 45)).await.unwrap();
        let analysis = db.session_length_analysis(TimeRange { start: 0, end: 1_000_000 }).await.unwrap();
        assert_eq!(analysis.optimal_minutes, 45);
    }
}
