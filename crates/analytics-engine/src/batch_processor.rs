// crates/analytics-engine/src/batch_processor.rs
//! The Batch Processor (C11): five ordered phases (Load, Analytics,
//! Patterns, Gaps, Decisions) fanned out with bounded concurrency, with
//! a progress-event stream and self-process memory sampling.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use analytics_core::{Analyzer, Deadline, DecisionTracker, FlowAnalyzer, KnowledgeGapDetector, ProductivityAnalyzer};
use analytics_core::ConversationSource;
use analytics_db::{BatchOptions, ConflictPolicy, Database};
use analytics_types::{Conversation, ConversationAnalytics, DecisionTracking, KnowledgeGap, Message, ProductivityPattern, WindowType};
use futures::stream::{self, StreamExt};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Load,
    Analytics,
    Patterns,
    Gaps,
    Decisions,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Analytics => "analytics",
            Phase::Patterns => "patterns",
            Phase::Gaps => "gaps",
            Phase::Decisions => "decisions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisType {
    Analytics,
    Patterns,
    Gaps,
    Decisions,
}

#[derive(Debug, Clone)]
pub struct BatchProcessOptions {
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub max_memory_usage_mb: u64,
    pub enable_progress_tracking: bool,
    pub enable_error_recovery: bool,
    pub retry_attempts: u32,
    pub analysis_types: Vec<AnalysisType>,
    pub max_processing_time_ms: u64,
}

impl Default for BatchProcessOptions {
    fn default() -> Self {
        let cfg = analytics_core::BatchProcessorConfig::default();
        Self {
            batch_size: cfg.batch_size,
            max_concurrency: cfg.max_concurrency,
            max_memory_usage_mb: cfg.max_memory_usage_mb,
            enable_progress_tracking: cfg.enable_progress_tracking,
            enable_error_recovery: cfg.enable_error_recovery,
            retry_attempts: cfg.retry_attempts,
            analysis_types: vec![AnalysisType::Analytics, AnalysisType::Patterns, AnalysisType::Gaps, AnalysisType::Decisions],
            max_processing_time_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub processed: usize,
    pub total: usize,
    pub failed: usize,
    pub current_operation: String,
    pub estimated_time_remaining_ms: Option<u64>,
    pub memory_usage_mb: f64,
    pub throughput_per_second: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BatchRunOutcome {
    pub success: bool,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub phase_failures: Vec<(&'static str, usize)>,
    pub errors: Vec<String>,
    pub peak_memory_mb: f64,
}

struct LoadedConversation {
    conversation: Conversation,
    messages: Vec<Message>,
}

#[derive(Default)]
struct MemorySample {
    current_mb: f64,
    peak_mb: f64,
}

/// Samples this process's RSS at 1 Hz on a background task, retaining
/// the observed peak. Stopped by dropping the returned handle.
struct MemoryMonitor {
    state: Arc<Mutex<MemorySample>>,
    handle: tokio::task::JoinHandle<()>,
}

impl MemoryMonitor {
    fn start() -> Self {
        let state = Arc::new(Mutex::new(MemorySample::default()));
        let state_task = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            let Ok(pid) = sysinfo::get_current_pid() else { return };
            let mut sys = System::new();
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                if let Some(process) = sys.process(pid) {
                    let mb = process.memory() as f64 / (1024.0 * 1024.0);
                    let mut guard = state_task.lock().unwrap_or_else(|e| e.into_inner());
                    guard.current_mb = mb;
                    guard.peak_mb = guard.peak_mb.max(mb);
                }
            }
        });
        Self { state, handle }
    }

    fn sample(&self) -> MemorySample {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        MemorySample { current_mb: guard.current_mb, peak_mb: guard.peak_mb }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Folds a batch of freshly analyzed rows into a single `Day` window
/// pattern covering their full `analyzed_at` span. A coarse rollup: the
/// per-conversation detail already lives in `conversation_analytics`.
fn aggregate_window(rows: &[ConversationAnalytics]) -> ProductivityPattern {
    let window_start = rows.iter().map(|r| r.analyzed_at).min().unwrap_or(0);
    let window_end = rows.iter().map(|r| r.analyzed_at).max().unwrap_or(window_start);
    let n = rows.len() as f64;
    let avg_productivity = rows.iter().map(|r| r.productivity_score).sum::<f64>() / n;
    let peak_productivity = rows.iter().map(|r| r.productivity_score).fold(f64::MIN, f64::max);
    let min_productivity = rows.iter().map(|r| r.productivity_score).fold(f64::MAX, f64::min);
    let insight_count: u32 = rows.iter().map(|r| r.insight_count).sum();
    let decision_count: u32 = rows.iter().map(|r| r.breakthrough_count).sum();

    ProductivityPattern {
        id: None,
        window_start,
        window_end,
        window_type: WindowType::Day,
        conversation_count: rows.len() as u32,
        message_count: 0,
        decision_count,
        insight_count,
        avg_productivity,
        peak_productivity,
        min_productivity,
        peak_hours: std::collections::BTreeSet::new(),
        optimal_session_length: 0,
        sample_size: rows.len() as u32,
        confidence_level: (rows.len() as f64 / 30.0).min(1.0),
    }
}

pub struct BatchProcessor<S: ConversationSource> {
    source: Arc<S>,
    db: Database,
    options: BatchProcessOptions,
}

impl<S: ConversationSource + 'static> BatchProcessor<S> {
    pub fn new(source: Arc<S>, db: Database, options: BatchProcessOptions) -> Self {
        Self { source, db, options }
    }

    fn send_progress(
        &self,
        tx: &Option<tokio::sync::mpsc::UnboundedSender<ProgressEvent>>,
        monitor: &MemoryMonitor,
        started_at: Instant,
        phase: Phase,
        processed: usize,
        total: usize,
        failed: usize,
        current_operation: impl Into<String>,
    ) {
        if !self.options.enable_progress_tracking {
            return;
        }
        let Some(tx) = tx else { return };
        let elapsed_secs = started_at.elapsed().as_secs_f64().max(1e-6);
        let throughput_per_second = processed as f64 / elapsed_secs;
        let estimated_time_remaining_ms = if throughput_per_second > 0.0 && total > processed {
            Some((((total - processed) as f64) / throughput_per_second * 1000.0) as u64)
        } else {
            None
        };
        let sample = monitor.sample();
        let _ = tx.send(ProgressEvent {
            phase,
            processed,
            total,
            failed,
            current_operation: current_operation.into(),
            estimated_time_remaining_ms,
            memory_usage_mb: sample.current_mb,
            throughput_per_second,
        });
        if self.options.max_memory_usage_mb > 0 {
            let threshold = self.options.max_memory_usage_mb as f64 * 0.9;
            if sample.current_mb > threshold {
                warn!(memory_usage_mb = sample.current_mb, threshold, "batch processor approaching memory limit");
            }
        }
    }

    /// Runs the five-phase pipeline over `ids`. A top-level failure (the
    /// source or database becoming unavailable) returns `success=false`
    /// with every id counted as failed; otherwise each phase's own
    /// failures are attributed to that phase and the pipeline continues.
    pub async fn run(
        &self,
        ids: &[String],
        max_processing_time_ms: u64,
        progress: Option<tokio::sync::mpsc::UnboundedSender<ProgressEvent>>,
    ) -> BatchRunOutcome {
        let total = ids.len();
        let mut outcome = BatchRunOutcome { success: true, total, ..Default::default() };
        if total == 0 {
            return outcome;
        }

        let deadline = Deadline::from_millis(max_processing_time_ms);
        if deadline.expired() {
            info!("batch processor deadline already expired, processing 0");
            return outcome;
        }

        let monitor = MemoryMonitor::start();
        let started_at = Instant::now();

        // Phase 1: Load.
        let concurrency = self.options.max_concurrency.max(1);
        let loaded: Vec<Option<LoadedConversation>> = stream::iter(ids.iter().cloned())
            .map(|id| {
                let source = Arc::clone(&self.source);
                async move {
                    let conversation = source.get_conversation(&id).await.ok().flatten()?;
                    let messages = source.get_messages(&id).await.ok()?;
                    Some(LoadedConversation { conversation, messages })
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let load_failed = loaded.iter().filter(|l| l.is_none()).count();
        if load_failed > 0 {
            outcome.phase_failures.push((Phase::Load.as_str(), load_failed));
            outcome.failed += load_failed;
        }
        let loaded: Vec<LoadedConversation> = loaded.into_iter().flatten().collect();
        self.send_progress(&progress, &monitor, started_at, Phase::Load, loaded.len(), total, outcome.failed, "loading conversations");
        debug!(loaded = loaded.len(), failed = load_failed, "batch processor: load phase complete");

        if deadline.expired() {
            outcome.processed = 0;
            return outcome;
        }

        // Phase 2: Analytics.
        let mut rows = Vec::with_capacity(loaded.len());
        if self.options.analysis_types.contains(&AnalysisType::Analytics) && !loaded.is_empty() {
            let analyzed: Vec<(String, analytics_types::ConversationAnalytics)> = stream::iter(loaded.iter())
                .map(|item| {
                    let conversation = item.conversation.clone();
                    let messages = item.messages.clone();
                    async move {
                        tokio::task::spawn_blocking(move || {
                            let flow = FlowAnalyzer::new().analyze(&conversation, &messages);
                            let productivity = ProductivityAnalyzer::new().analyze(&conversation, &messages);
                            (conversation.id, flow, productivity)
                        })
                        .await
                        .ok()
                    }
                })
                .buffer_unordered(concurrency)
                .filter_map(|r| async move { r })
                .map(|(id, flow, productivity)| {
                    let analyzed_at = chrono::Utc::now().timestamp_millis();
                    (id.clone(), crate::engine::merge_analytics(&id, analyzed_at, flow, productivity))
                })
                .collect()
                .await;
            rows = analyzed.into_iter().map(|(_, row)| row).collect();

            if !rows.is_empty() {
                let batch_options =
                    BatchOptions { batch_size: self.options.batch_size, conflict: ConflictPolicy::Ignore, enable_rollback: self.options.enable_error_recovery };
                match self.db.batch_save_conversation_analytics(&rows, batch_options).await {
                    Ok(result) => {
                        outcome.processed += result.inserted + result.updated;
                        if result.failed > 0 {
                            outcome.phase_failures.push((Phase::Analytics.as_str(), result.failed));
                            outcome.failed += result.failed;
                            outcome.errors.extend(result.errors);
                        }
                    }
                    Err(e) => {
                        outcome.phase_failures.push((Phase::Analytics.as_str(), rows.len()));
                        outcome.failed += rows.len();
                        outcome.errors.push(e.to_string());
                    }
                }
            }
        }
        self.send_progress(&progress, &monitor, started_at, Phase::Analytics, outcome.processed, total, outcome.failed, "persisting conversation analytics");

        if deadline.expired() {
            outcome.peak_memory_mb = monitor.sample().peak_mb;
            return outcome;
        }

        // Phase 3: Patterns — one aggregate window covering this batch.
        if self.options.analysis_types.contains(&AnalysisType::Patterns) && !rows.is_empty() {
            let pattern = aggregate_window(&rows);
            if let Err(e) = self.db.upsert_productivity_pattern(&pattern).await {
                outcome.phase_failures.push((Phase::Patterns.as_str(), 1));
                outcome.errors.push(e.to_string());
            }
        }
        self.send_progress(&progress, &monitor, started_at, Phase::Patterns, outcome.processed, total, outcome.failed, "aggregating productivity patterns");

        if deadline.expired() {
            outcome.peak_memory_mb = monitor.sample().peak_mb;
            return outcome;
        }

        // Phase 4: Gaps.
        if self.options.analysis_types.contains(&AnalysisType::Gaps) && !loaded.is_empty() {
            let gaps_by_conversation: Vec<(String, Vec<KnowledgeGap>)> = loaded
                .iter()
                .map(|item| (item.conversation.id.clone(), KnowledgeGapDetector::new().analyze(&item.conversation, &item.messages)))
                .collect();
            let batch_options =
                BatchOptions { batch_size: self.options.batch_size, conflict: ConflictPolicy::Replace, enable_rollback: self.options.enable_error_recovery };
            if let Err(e) = self.db.batch_process_gaps_from_conversations(&gaps_by_conversation, batch_options).await {
                outcome.phase_failures.push((Phase::Gaps.as_str(), loaded.len()));
                outcome.errors.push(e.to_string());
            }
        }
        self.send_progress(&progress, &monitor, started_at, Phase::Gaps, outcome.processed, total, outcome.failed, "clustering knowledge gaps");

        if deadline.expired() {
            outcome.peak_memory_mb = monitor.sample().peak_mb;
            return outcome;
        }

        // Phase 5: Decisions.
        if self.options.analysis_types.contains(&AnalysisType::Decisions) && !loaded.is_empty() {
            let decisions: Vec<DecisionTracking> = loaded
                .iter()
                .flat_map(|item| DecisionTracker::new().analyze(&item.conversation, &item.messages))
                .collect();
            if !decisions.is_empty() {
                let batch_options =
                    BatchOptions { batch_size: self.options.batch_size, conflict: ConflictPolicy::Ignore, enable_rollback: self.options.enable_error_recovery };
                if let Err(e) = self.db.batch_track_decisions(&decisions, batch_options).await {
                    outcome.phase_failures.push((Phase::Decisions.as_str(), decisions.len()));
                    outcome.errors.push(e.to_string());
                }
            }
        }
        self.send_progress(&progress, &monitor, started_at, Phase::Decisions, outcome.processed, total, outcome.failed, "tracking decisions");

        outcome.peak_memory_mb = monitor.sample().peak_mb;
        outcome.success = outcome.processed > 0 || total == 0 || outcome.failed < total;
        outcome
    }
}
