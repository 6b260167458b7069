// crates/analytics-engine/src/engine.rs
//! The Analytics Engine (C10): orchestrates the four pure analyzers,
//! persists their output through `analytics-db`, and serves cached
//! reports. Generic over `ConversationSource` so tests run against an
//! in-memory fake and production embedders supply their own adapter.

use std::sync::Arc;
use std::time::Duration;

use analytics_core::{
    needs_analysis, Analyzer, AnalyticsConfig, AnalyticsError, AnalyticsResult, ConversationSource,
    DecisionTracker, Deadline, FlowAnalyzer, KnowledgeGapDetector, ProductivityAnalyzer,
};
use analytics_types::{AttributeBag, AttributeValue, ConversationAnalytics, TimeRange};
use analytics_db::{BatchOptions, Database};
use tracing::{debug, info, warn};

use crate::batch_processor::{BatchProcessOptions, BatchProcessor, BatchRunOutcome, ProgressEvent};
use crate::cache::{cache_key, ReportCache};
use crate::report::{ConversationMetrics, DecisionMetrics, KnowledgeGapMetrics, ProductivityInsights, Report, ReportFormat};

/// Folds a single conversation's `FlowAnalyzer`/`ProductivityAnalyzer`
/// output into one `ConversationAnalytics` row. Fields with no direct
/// counterpart on the row (`coherence_score`, `progression_score`,
/// `average_topic_duration_ms`, `vocabulary_richness`,
/// `session_duration_ms`, `active_time_ms`, `avg_response_latency_ms`,
/// `effectiveness_score`, `peak_period`) are folded into `metadata`
/// rather than dropped.
pub(crate) fn merge_analytics(
    conversation_id: &str,
    analyzed_at: i64,
    flow: analytics_core::FlowMetrics,
    productivity: analytics_core::ProductivityMetrics,
) -> ConversationAnalytics {
    let mut metadata = AttributeBag::new();
    metadata.insert("coherence_score", AttributeValue::Num(flow.coherence_score));
    metadata.insert("progression_score", AttributeValue::Num(flow.progression_score));
    metadata.insert("average_topic_duration_ms", AttributeValue::Num(flow.average_topic_duration_ms));
    metadata.insert("vocabulary_richness", AttributeValue::Num(flow.vocabulary_richness));
    metadata.insert("session_duration_ms", AttributeValue::Num(productivity.session_duration_ms as f64));
    metadata.insert("active_time_ms", AttributeValue::Num(productivity.active_time_ms as f64));
    metadata.insert("avg_response_latency_ms", AttributeValue::Num(productivity.avg_response_latency_ms));
    metadata.insert("effectiveness_score", AttributeValue::Num(productivity.effectiveness_score));
    if let Some(peak) = productivity.peak_period {
        metadata.insert("peak_period_start", AttributeValue::Num(peak.start as f64));
        metadata.insert("peak_period_end", AttributeValue::Num(peak.end as f64));
    }

    ConversationAnalytics {
        id: None,
        conversation_id: conversation_id.to_string(),
        analyzed_at,
        topic_count: flow.topic_count,
        topic_transitions: flow.topic_transitions,
        depth_score: flow.depth_score,
        circularity_index: flow.circularity_index,
        productivity_score: productivity.productivity_score,
        resolution_time: flow.resolution_time,
        insight_count: productivity.insight_count,
        breakthrough_count: productivity.breakthrough_count,
        question_quality_avg: productivity.question_quality_avg,
        response_quality_avg: productivity.response_quality_avg,
        engagement_score: productivity.engagement_score,
        metadata,
    }
    .clamped()
}

pub struct AnalyticsEngine<S: ConversationSource> {
    source: Arc<S>,
    db: Database,
    config: AnalyticsConfig,
    cache: ReportCache,
    flow: FlowAnalyzer,
    productivity: ProductivityAnalyzer,
    gaps: KnowledgeGapDetector,
    decisions: DecisionTracker,
}

impl<S: ConversationSource + 'static> AnalyticsEngine<S> {
    pub fn new(source: Arc<S>, db: Database, config: AnalyticsConfig) -> Self {
        let cache = ReportCache::new(Duration::from_secs(config.cache_expiration_minutes * 60));
        Self {
            source,
            db,
            config,
            cache,
            flow: FlowAnalyzer::new(),
            productivity: ProductivityAnalyzer::new(),
            gaps: KnowledgeGapDetector::new(),
            decisions: DecisionTracker::new(),
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Removes every cached report whose key contains `pattern`.
    pub fn invalidate_cache(&self, pattern: &str) {
        self.cache.invalidate(pattern);
    }

    /// Idempotent analysis of a single conversation: writes one
    /// `conversation_analytics` row and any derived gaps/decisions.
    /// Silently succeeds with no writes when the conversation has no
    /// messages; fails `NotFound` when the conversation itself is absent.
    pub async fn analyze_conversation(&self, conversation_id: &str) -> AnalyticsResult<()> {
        let conversation = self
            .source
            .get_conversation(conversation_id)
            .await
            .map_err(|e| AnalyticsError::database(e.to_string()))?
            .ok_or_else(|| AnalyticsError::not_found(format!("conversation {conversation_id}")))?;

        let messages =
            self.source.get_messages(conversation_id).await.map_err(|e| AnalyticsError::database(e.to_string()))?;
        if messages.is_empty() {
            debug!(conversation_id, "no messages, skipping analysis");
            return Ok(());
        }

        let flow_metrics = self.flow.analyze(&conversation, &messages);
        let productivity_metrics = self.productivity.analyze(&conversation, &messages);
        let gap_candidates = self.gaps.analyze(&conversation, &messages);
        let decision_candidates = self.decisions.analyze(&conversation, &messages);

        let analyzed_at = chrono::Utc::now().timestamp_millis();
        let row = merge_analytics(conversation_id, analyzed_at, flow_metrics, productivity_metrics);
        self.db.save_conversation_analytics(&row).await?;

        if !gap_candidates.is_empty() {
            self.db.batch_save_gaps(&gap_candidates, conversation_id, BatchOptions::default()).await?;
        }
        for decision in &decision_candidates {
            self.db.save_decision(decision).await?;
        }

        self.cache.invalidate("report:");
        info!(conversation_id, analyzed_at, "analyzed conversation");
        Ok(())
    }

    /// Selects up to `batch_processing_size` conversations whose
    /// analytics is stale (per the incremental-scan predicate) and
    /// analyzes each until `max_processing_time_ms` elapses. Returns the
    /// processed count. A no-op returning 0 when incremental processing
    /// is disabled.
    pub async fn process_needing_analysis(&self) -> AnalyticsResult<usize> {
        if !self.config.enable_incremental_processing {
            return Ok(0);
        }

        let deadline = Deadline::from_millis(self.config.max_processing_time_ms);
        if deadline.expired() {
            return Ok(0);
        }

        let candidate_ids = self
            .source
            .conversations_updated_since(0)
            .await
            .map_err(|e| AnalyticsError::database(e.to_string()))?;
        let latest = self.db.latest_analyzed_at(&candidate_ids).await?;

        let mut stale = Vec::new();
        for id in &candidate_ids {
            if stale.len() >= self.config.batch_processing_size {
                break;
            }
            let Some(conversation) =
                self.source.get_conversation(id).await.map_err(|e| AnalyticsError::database(e.to_string()))?
            else {
                continue;
            };
            if needs_analysis(latest.get(id).copied(), conversation.updated_at) {
                stale.push(id.clone());
            }
        }

        let mut processed = 0usize;
        for id in &stale {
            if deadline.expired() {
                break;
            }
            match self.analyze_conversation(id).await {
                Ok(()) => processed += 1,
                Err(e) => warn!(conversation_id = %id, error = %e, "incremental analysis failed"),
            }
        }
        Ok(processed)
    }

    /// Aggregates conversation metrics, productivity insights,
    /// knowledge-gap metrics, and decision metrics in parallel. Any
    /// sub-aggregation that fails contributes zeroed defaults; the call
    /// itself still succeeds. Results are cached under
    /// `report:{format}:{range_hash}`.
    pub async fn generate_report(&self, range: TimeRange, format: ReportFormat) -> AnalyticsResult<Report> {
        let key = cache_key(format, range);
        if let Some(cached) = self.cache.get(&key) {
            debug!(key, "report cache hit");
            return Ok(cached);
        }

        let (conversation_metrics, productivity_insights, knowledge_gap_metrics, decision_metrics) = tokio::join!(
            self.conversation_metrics(range),
            self.productivity_insights(range),
            self.knowledge_gap_metrics(range),
            self.decision_metrics(range),
        );

        let conversation_metrics = conversation_metrics.unwrap_or_default();
        let productivity_insights = productivity_insights.unwrap_or_default();
        let knowledge_gap_metrics = knowledge_gap_metrics.unwrap_or_default();
        let decision_metrics = decision_metrics.unwrap_or_default();

        let mut insights = Vec::new();
        let mut recommendations = Vec::new();
        if productivity_insights.trend < 0.0 {
            insights.push("productivity trend is declining over the selected range".to_string());
            recommendations.push("review recent conversations for recurring friction points".to_string());
        }
        if knowledge_gap_metrics.unresolved_count > 0 {
            insights.push(format!("{} unresolved knowledge gaps in range", knowledge_gap_metrics.unresolved_count));
        }
        if decision_metrics.reversal_rate > 20.0 {
            recommendations.push("decision reversal rate is elevated; consider more upfront analysis".to_string());
        }

        let report = Report {
            format,
            range,
            conversation_metrics,
            productivity_insights,
            knowledge_gap_metrics,
            decision_metrics,
            recommendations,
            insights,
            generated_at: chrono::Utc::now().timestamp_millis(),
        };

        self.cache.put(key, report.clone());
        Ok(report)
    }

    async fn conversation_metrics(&self, range: TimeRange) -> AnalyticsResult<ConversationMetrics> {
        let summary = self.db.productivity_summary(range).await?;
        Ok(ConversationMetrics {
            total_conversations: summary.total_conversations,
            average_depth_score: summary.average_depth,
            average_circularity_index: summary.average_circularity,
            total_topic_transitions: summary.total_topic_transitions,
        })
    }

    async fn productivity_insights(&self, range: TimeRange) -> AnalyticsResult<ProductivityInsights> {
        let summary = self.db.productivity_summary(range).await?;
        let peak = self.db.peak_hours(range).await?;
        let session = self.db.session_length_analysis(range).await?;
        Ok(ProductivityInsights {
            average_productivity: summary.average_productivity,
            median_productivity: summary.median_productivity,
            trend: summary.trend,
            total_insights: summary.total_insights,
            peak_hours: peak.hours.into_iter().collect(),
            optimal_session_minutes: session.optimal_minutes,
        })
    }

    async fn knowledge_gap_metrics(&self, range: TimeRange) -> AnalyticsResult<KnowledgeGapMetrics> {
        let coverage = self.db.topic_coverage(range).await?;
        let unresolved_count: u32 = coverage.iter().map(|c| c.unresolved).sum();
        let total_resolved: u32 = coverage.iter().map(|c| c.resolved).sum();
        let total = unresolved_count + total_resolved;
        let resolution_rate = if total == 0 { 0.0 } else { total_resolved as f64 / total as f64 };
        let clusters = self.db.gap_clusters(2, None).await?;
        let top_cluster_priority = clusters.iter().map(|c| c.priority).max_by_key(priority_rank).map(|p| p.as_str().to_string());
        Ok(KnowledgeGapMetrics { unresolved_count, top_cluster_priority, resolution_rate })
    }

    async fn decision_metrics(&self, range: TimeRange) -> AnalyticsResult<DecisionMetrics> {
        let analysis = self.db.decision_analysis(range).await?;
        Ok(DecisionMetrics {
            total_decisions: analysis.total_decisions,
            average_outcome_score: analysis.average_outcome_score,
            reversal_rate: analysis.reversal_rate,
            weekly_velocity: analysis.weekly_velocity,
        })
    }

    /// Phased batch pipeline (Load → Analytics → Patterns → Gaps →
    /// Decisions) over `ids`, delegating the mechanics to `BatchProcessor`
    /// (C11) with this engine's source, database, and analyzers.
    pub async fn batch_process_conversations(
        &self,
        ids: &[String],
        options: BatchProcessOptions,
        progress: Option<tokio::sync::mpsc::UnboundedSender<ProgressEvent>>,
    ) -> BatchRunOutcome {
        let processor = BatchProcessor::new(Arc::clone(&self.source), self.db.clone(), options.clone());
        let outcome = processor.run(ids, options.max_processing_time_ms, progress).await;
        self.cache.invalidate("report:");
        outcome
    }
}

fn priority_rank(p: &analytics_types::Priority) -> u8 {
    match p {
        analytics_types::Priority::Critical => 3,
        analytics_types::Priority::High => 2,
        analytics_types::Priority::Medium => 1,
        analytics_types::Priority::Low => 0,
    }
}
