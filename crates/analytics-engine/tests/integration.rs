// crates/analytics-engine/tests/integration.rs
//! Exercises the full Engine -> Repositories path against a real
//! in-memory SQLite database, covering the literal end-to-end scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use analytics_core::{AnalyticsConfig, ConversationSource, SourceError};
use analytics_db::Database;
use analytics_engine::{AnalyticsEngine, ReportFormat};
use analytics_types::{
    AttributeBag, Conversation, DecisionLifecycle, DecisionStatus, DecisionTracking, DecisionType,
    GapType, KnowledgeGap, Message, MessageRole, Priority, TimeRange,
};
use async_trait::async_trait;

#[derive(Default)]
struct FixtureSource {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
}

impl FixtureSource {
    fn add(&mut self, conversation: Conversation, messages: Vec<Message>) {
        let id = conversation.id.clone();
        self.conversations.insert(id.clone(), conversation);
        self.messages.insert(id, messages);
    }
}

#[async_trait]
impl ConversationSource for FixtureSource {
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, SourceError> {
        Ok(self.conversations.get(id).cloned())
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, SourceError> {
        Ok(self.messages.get(conversation_id).cloned().unwrap_or_default())
    }

    async fn conversations_updated_since(&self, since_ms: i64) -> Result<Vec<String>, SourceError> {
        Ok(self.conversations.values().filter(|c| c.updated_at >= since_ms).map(|c| c.id.clone()).collect())
    }
}

fn conv(id: &str, updated_at: i64) -> Conversation {
    Conversation { id: id.into(), created_at: 0, updated_at, title: None, attributes: AttributeBag::new() }
}

fn msg(conversation_id: &str, role: MessageRole, content: &str, created_at: i64) -> Message {
    Message { id: format!("{conversation_id}-{created_at}"), conversation_id: conversation_id.into(), role, content: content.into(), created_at }
}

#[tokio::test]
async fn report_on_empty_corpus_returns_zeroed_metrics_and_succeeds() {
    let source = Arc::new(FixtureSource::default());
    let db = Database::new_in_memory().await.unwrap();
    let engine = AnalyticsEngine::new(source, db, AnalyticsConfig::default());

    let report = engine.generate_report(TimeRange::new(1, 2), ReportFormat::Summary).await.unwrap();

    assert_eq!(report.conversation_metrics.total_conversations, 0);
    assert!(report.recommendations.is_empty());
    assert!(report.insights.is_empty());
}

#[tokio::test]
async fn incremental_scan_processes_only_the_stale_conversation() {
    let mut source = FixtureSource::default();
    source.add(
        conv("fresh", 1_000),
        vec![msg("fresh", MessageRole::User, "what time zone should we standardize on?", 0)],
    );
    source.add(
        conv("stale", 5_000),
        vec![
            msg("stale", MessageRole::User, "why does the retry loop spin forever?", 0),
            msg("stale", MessageRole::Assistant, "we decided to go with exponential backoff and a max attempt cap", 2_000),
        ],
    );

    let db = Database::new_in_memory().await.unwrap();
    // Pre-seed analytics for "fresh" so it no longer needs analysis.
    db.save_conversation_analytics(&analytics_types::ConversationAnalytics {
        id: None,
        conversation_id: "fresh".into(),
        analyzed_at: 2_000,
        topic_count: 1,
        topic_transitions: 0,
        depth_score: 10.0,
        circularity_index: 0.0,
        productivity_score: 10.0,
        resolution_time: None,
        insight_count: 0,
        breakthrough_count: 0,
        question_quality_avg: 0.0,
        response_quality_avg: 0.0,
        engagement_score: 0.0,
        metadata: AttributeBag::new(),
    })
    .await
    .unwrap();

    let engine = AnalyticsEngine::new(Arc::new(source), db, AnalyticsConfig::default());
    let processed = engine.process_needing_analysis().await.unwrap();

    assert_eq!(processed, 1);
}

#[tokio::test]
async fn gap_dedup_merges_on_normalized_content_and_type() {
    let db = Database::new_in_memory().await.unwrap();

    let gap = |content: &str, last: i64| KnowledgeGap {
        id: None,
        gap_type: GapType::Concept,
        content: content.to_string(),
        normalized_content: analytics_types::normalize_content(content),
        frequency: 1,
        first_occurrence: 0,
        last_occurrence: last,
        exploration_depth: 20.0,
        resolved: false,
        resolution_conversation_id: None,
        resolution_date: None,
        resolution_quality: None,
        related_entities: vec![],
        related_gaps: vec![],
        suggested_actions: vec![],
        suggested_resources: vec![],
    };

    db.save_gap(&gap("CAP theorem", 1_000), "c1").await.unwrap();
    db.save_gap(&gap("CAP Theorem!", 2_000), "c2").await.unwrap();

    let unresolved = db.get_unresolved_gaps(10).await.unwrap();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].frequency, 2);
    assert_eq!(unresolved[0].last_occurrence, 2_000);
}

#[tokio::test]
async fn gap_cluster_priority_is_critical_for_high_frequency_low_depth() {
    let db = Database::new_in_memory().await.unwrap();

    // Five common stem words plus one distinguishing trailing token per
    // gap: pairwise word-set Jaccard is 5/6 ~= 0.83, well above the 0.7
    // threshold, while no normalized string is a substring of another
    // (so `save_gap`'s dedup never merges them into one row).
    let suffixes = ["zero", "one", "two", "three", "four"];
    for suffix in suffixes {
        let content = format!("distributed consensus protocol design review {suffix}");
        let normalized = analytics_types::normalize_content(&content);
        let gap = KnowledgeGap {
            id: None,
            gap_type: GapType::Topic,
            content,
            normalized_content: normalized,
            frequency: 2,
            first_occurrence: 0,
            last_occurrence: 0,
            exploration_depth: 20.0,
            resolved: false,
            resolution_conversation_id: None,
            resolution_date: None,
            resolution_quality: None,
            related_entities: vec![],
            related_gaps: vec![],
            suggested_actions: vec![],
            suggested_resources: vec![],
        };
        db.save_gap(&gap, "c1").await.unwrap();
    }

    let clusters = db.gap_clusters(2, Some(0.7)).await.unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].total_frequency, 10);
    assert!(clusters[0].average_exploration_depth < 30.0);
    assert_eq!(clusters[0].priority, Priority::Critical);
}

#[tokio::test]
async fn decision_reversal_stamps_count_and_lessons_learned() {
    let db = Database::new_in_memory().await.unwrap();

    let decision = DecisionTracking {
        id: None,
        decision_summary: "Adopt ClickHouse".into(),
        decision_type: Some(DecisionType::Strategic),
        conversation_ids: vec!["c1".into()],
        lifecycle: DecisionLifecycle { decision_made_at: Some(1_700_000_000_000), ..Default::default() },
        clarity_score: 80.0,
        confidence_level: 80.0,
        consensus_level: 80.0,
        reversal_count: 0,
        modification_count: 0,
        outcome_score: None,
        information_completeness: 80.0,
        stakeholder_count: 1,
        alternatives_considered: 2,
        risk_assessed: true,
        success_factors: vec![],
        failure_factors: vec![],
        lessons_learned: vec![],
        tags: vec![],
        priority: Priority::High,
        status: DecisionStatus::Decided,
    };
    let id = db.save_decision(&decision).await.unwrap();

    db.mark_reversed(&id, "latency regression").await.unwrap();

    let range = TimeRange::new(0, i64::MAX);
    let analysis = db.decision_analysis(range).await.unwrap();
    assert_eq!(analysis.total_decisions, 1);
    assert_eq!(analysis.reversal_rate, 100.0);
}

#[tokio::test]
async fn productivity_trend_is_positive_for_increasing_scores() {
    let db = Database::new_in_memory().await.unwrap();

    for (i, score) in [40.0, 50.0, 60.0, 70.0, 80.0].into_iter().enumerate() {
        db.save_conversation_analytics(&analytics_types::ConversationAnalytics {
            id: None,
            conversation_id: format!("c{i}"),
            analyzed_at: 1_000 * (i as i64 + 1),
            topic_count: 1,
            topic_transitions: 0,
            depth_score: 50.0,
            circularity_index: 0.0,
            productivity_score: score,
            resolution_time: None,
            insight_count: 0,
            breakthrough_count: 0,
            question_quality_avg: 0.0,
            response_quality_avg: 0.0,
            engagement_score: 0.0,
            metadata: AttributeBag::new(),
        })
        .await
        .unwrap();
    }

    let summary = db.productivity_summary(TimeRange::new(0, i64::MAX)).await.unwrap();
    assert_eq!(summary.total_conversations, 5);
    assert!(summary.trend > 0.0);
}

#[tokio::test]
async fn end_to_end_analyze_then_report_reflects_the_conversation() {
    let mut source = FixtureSource::default();
    source.add(
        conv("deploy-pipeline", 3_600_000),
        vec![
            msg("deploy-pipeline", MessageRole::User, "why does the deploy pipeline keep failing on staging?", 0),
            msg("deploy-pipeline", MessageRole::Assistant, "the health check times out before the new pods finish warming up", 60_000),
            msg("deploy-pipeline", MessageRole::User, "can we just raise the timeout?", 120_000),
            msg(
                "deploy-pipeline",
                MessageRole::Assistant,
                "we decided to go with a staged rollout instead because it reduces blast radius",
                600_000,
            ),
        ],
    );

    let db = Database::new_in_memory().await.unwrap();
    let engine = AnalyticsEngine::new(Arc::new(source), db, AnalyticsConfig::default());

    engine.analyze_conversation("deploy-pipeline").await.unwrap();

    let report = engine.generate_report(TimeRange::new(0, i64::MAX), ReportFormat::Summary).await.unwrap();
    assert_eq!(report.conversation_metrics.total_conversations, 1);
}
