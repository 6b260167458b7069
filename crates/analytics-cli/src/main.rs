// crates/analytics-cli/src/main.rs
//! Thin demo/test harness for the conversation analytics engine. Not a
//! product surface: it seeds a fixed in-memory corpus, drives
//! `AnalyticsEngine`/`BatchProcessor` against a scratch SQLite database,
//! and renders progress with `indicatif` the way the server's own
//! deep-indexing spinner does.

mod demo;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use analytics_core::{AnalyticsConfig, Config};
use analytics_db::Database;
use analytics_engine::{AnalyticsEngine, BatchProcessOptions, Phase, ProgressEvent, ReportFormat};
use analytics_types::TimeRange;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::demo::DemoSource;

#[derive(Parser)]
#[command(name = "analytics-cli", about = "Exercises the conversation analytics engine against a demo corpus")]
struct Cli {
    /// Path to a TOML config file (falls back to defaults, then ANALYTICS_* env overlay).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the SQLite database file. Defaults to a scratch in-memory database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the demo corpus's conversation ids.
    List,
    /// Analyze a single conversation by id.
    Analyze { conversation_id: String },
    /// Run incremental analysis over every conversation needing it.
    Incremental,
    /// Run the full five-phase batch pipeline over the whole demo corpus.
    BatchProcess,
    /// Generate and print a report over a millisecond time range.
    Report {
        #[arg(long, default_value_t = 0)]
        start: i64,
        #[arg(long, default_value_t = i64::MAX)]
        end: i64,
        #[arg(long, default_value = "summary")]
        format: String,
    },
}

fn parse_format(raw: &str) -> ReportFormat {
    match raw {
        "detailed" => ReportFormat::Detailed,
        "executive" => ReportFormat::Executive,
        _ => ReportFormat::Summary,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config from {}", path.display()))?.overlay_env(),
        None => Config::default().overlay_env(),
    };

    let db = match &cli.db_path {
        Some(path) => Database::new(path).await.with_context(|| format!("opening database at {}", path.display()))?,
        None => Database::new_in_memory().await.context("opening in-memory database")?,
    };

    let source = Arc::new(DemoSource::default());
    let engine = AnalyticsEngine::new(Arc::clone(&source), db, config.analytics.clone());

    match cli.command {
        Command::List => {
            for id in source.ids() {
                println!("{id}");
            }
        }
        Command::Analyze { conversation_id } => {
            engine.analyze_conversation(&conversation_id).await?;
            println!("analyzed {conversation_id}");
        }
        Command::Incremental => {
            let processed = engine.process_needing_analysis().await?;
            println!("processed {processed} conversations");
        }
        Command::BatchProcess => {
            run_batch_process(&engine, source.ids(), config).await?;
        }
        Command::Report { start, end, format } => {
            let range = TimeRange::new(start, end);
            let report = engine.generate_report(range, parse_format(&format)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn run_batch_process(engine: &AnalyticsEngine<DemoSource>, ids: Vec<String>, config: Config) -> Result<()> {
    let options = BatchProcessOptions {
        batch_size: config.batch_processor.batch_size,
        max_concurrency: config.batch_processor.max_concurrency,
        max_memory_usage_mb: config.batch_processor.max_memory_usage_mb,
        enable_progress_tracking: config.batch_processor.enable_progress_tracking,
        enable_error_recovery: config.batch_processor.enable_error_recovery,
        retry_attempts: config.batch_processor.retry_attempts,
        max_processing_time_ms: config.analytics.max_processing_time_ms,
        ..BatchProcessOptions::default()
    };

    let total = ids.len() as u64;
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner} {bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let render = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            pb.set_length(event.total.max(1) as u64);
            pb.set_position(event.processed as u64);
            pb.set_message(format!(
                "{} — {:.1} items/s, {:.1} MB",
                phase_label(event.phase),
                event.throughput_per_second,
                event.memory_usage_mb
            ));
        }
        pb.finish_and_clear();
    });

    let outcome = engine.batch_process_conversations(&ids, options, Some(tx)).await;
    render.await.ok();

    println!("processed {}/{} (failed {})", outcome.processed, outcome.total, outcome.failed);
    for (phase, count) in &outcome.phase_failures {
        println!("  phase {phase} failed {count} item(s)");
    }
    if !outcome.success {
        anyhow::bail!("batch processing did not complete successfully");
    }
    Ok(())
}

fn phase_label(phase: Phase) -> &'static str {
    phase.as_str()
}
