// crates/analytics-db/src/migrations.rs
//! Inline SQL migrations for the analytics database schema. Small,
//! self-contained schema — no sqlx migration files.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: conversation_analytics
    r#"
CREATE TABLE IF NOT EXISTS conversation_analytics (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    analyzed_at INTEGER NOT NULL,
    topic_count INTEGER NOT NULL DEFAULT 0,
    topic_transitions INTEGER NOT NULL DEFAULT 0,
    depth_score REAL NOT NULL DEFAULT 0,
    circularity_index REAL NOT NULL DEFAULT 0,
    productivity_score REAL NOT NULL DEFAULT 0,
    resolution_time INTEGER,
    insight_count INTEGER NOT NULL DEFAULT 0,
    breakthrough_count INTEGER NOT NULL DEFAULT 0,
    question_quality_avg REAL NOT NULL DEFAULT 0,
    response_quality_avg REAL NOT NULL DEFAULT 0,
    engagement_score REAL NOT NULL DEFAULT 0,
    metadata TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_conv_analytics_conversation ON conversation_analytics(conversation_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_conv_analytics_analyzed_at ON conversation_analytics(analyzed_at DESC);"#,
    // Migration 2: productivity_patterns
    r#"
CREATE TABLE IF NOT EXISTS productivity_patterns (
    id TEXT PRIMARY KEY,
    window_start INTEGER NOT NULL,
    window_end INTEGER NOT NULL,
    window_type TEXT NOT NULL,
    conversation_count INTEGER NOT NULL DEFAULT 0,
    message_count INTEGER NOT NULL DEFAULT 0,
    decision_count INTEGER NOT NULL DEFAULT 0,
    insight_count INTEGER NOT NULL DEFAULT 0,
    avg_productivity REAL NOT NULL DEFAULT 0,
    peak_productivity REAL NOT NULL DEFAULT 0,
    min_productivity REAL NOT NULL DEFAULT 0,
    peak_hours TEXT,
    optimal_session_length INTEGER NOT NULL DEFAULT 0,
    sample_size INTEGER NOT NULL DEFAULT 0,
    confidence_level REAL NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(window_type, window_start)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_patterns_window ON productivity_patterns(window_start, window_end);"#,
    // Migration 3: knowledge_gaps
    r#"
CREATE TABLE IF NOT EXISTS knowledge_gaps (
    id TEXT PRIMARY KEY,
    gap_type TEXT NOT NULL,
    content TEXT NOT NULL,
    normalized_content TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 1,
    first_occurrence INTEGER NOT NULL,
    last_occurrence INTEGER NOT NULL,
    exploration_depth REAL NOT NULL DEFAULT 0,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolution_conversation_id TEXT,
    resolution_date INTEGER,
    resolution_quality REAL,
    related_entities TEXT,
    related_gaps TEXT,
    suggested_actions TEXT,
    suggested_resources TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(normalized_content, gap_type)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_gaps_last_occurrence ON knowledge_gaps(last_occurrence DESC);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_gaps_resolved ON knowledge_gaps(resolved);"#,
    // Migration 4: gap_conversations (which conversations raised a gap, for learning-curve lookups)
    r#"
CREATE TABLE IF NOT EXISTS gap_conversations (
    gap_id TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    occurred_at INTEGER NOT NULL,
    PRIMARY KEY (gap_id, conversation_id)
);
"#,
    // Migration 5: decision_tracking
    r#"
CREATE TABLE IF NOT EXISTS decision_tracking (
    id TEXT PRIMARY KEY,
    decision_summary TEXT NOT NULL,
    decision_type TEXT,
    conversation_ids TEXT,
    problem_identified_at INTEGER,
    options_considered_at INTEGER,
    decision_made_at INTEGER,
    implementation_started_at INTEGER,
    outcome_assessed_at INTEGER,
    clarity_score REAL NOT NULL DEFAULT 0,
    confidence_level REAL NOT NULL DEFAULT 0,
    consensus_level REAL NOT NULL DEFAULT 0,
    reversal_count INTEGER NOT NULL DEFAULT 0,
    modification_count INTEGER NOT NULL DEFAULT 0,
    outcome_score REAL,
    information_completeness REAL NOT NULL DEFAULT 0,
    stakeholder_count INTEGER NOT NULL DEFAULT 0,
    alternatives_considered INTEGER NOT NULL DEFAULT 0,
    risk_assessed INTEGER NOT NULL DEFAULT 0,
    success_factors TEXT,
    failure_factors TEXT,
    lessons_learned TEXT,
    tags TEXT,
    priority TEXT NOT NULL DEFAULT 'medium',
    status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_decisions_made_at ON decision_tracking(decision_made_at DESC);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_decisions_status ON decision_tracking(status);"#,
];
