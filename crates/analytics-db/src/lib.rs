// crates/analytics-db/src/lib.rs
//! SQLite-backed storage for the conversation analytics engine.
//!
//! A `Database` struct wraps an `sqlx::SqlitePool`, migrations are
//! tracked in a `_migrations` table, and repository methods live in
//! `impl Database` blocks split one file per concern, re-exported from
//! `queries`.

mod batch;
mod error;
mod migrations;
mod queries;

pub use batch::{BatchOptions, BatchOutcome, ConflictPolicy, ProgressFn};
pub use error::{classify, DbError, DbResult};
pub use queries::conversation_analytics::ProductivitySummary;
pub use queries::decision_tracking::{DecisionAnalysis, DecisionPattern};
pub use queries::knowledge_gaps::{GapCluster, LearningProgress, TopicCoverage};
pub use queries::productivity_patterns::{PeakHours, SessionLengthAnalysis};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// The set of tables this crate owns. Used to validate table names that
/// would otherwise be interpolated into SQL (`cleanup_old_data`,
/// `batch_delete`), since identifiers cannot be bound as parameters.
pub const OWNED_TABLES: &[&str] =
    &["conversation_analytics", "productivity_patterns", "knowledge_gaps", "decision_tracking"];

pub fn is_owned_table(table: &str) -> bool {
    OWNED_TABLES.contains(&table)
}

/// Database handle wrapping a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30))
            .log_slow_statements(tracing::log::LevelFilter::Warn, std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

        let db = Self { pool, db_path: path.to_owned() };
        db.run_migrations().await?;
        info!("analytics database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database for tests. `shared_cache(true)` so every pool
    /// connection sees the same database.
    pub async fn new_in_memory() -> DbResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:")?.shared_cache(true).busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        let db = Self { pool, db_path: PathBuf::new() };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)").execute(&self.pool).await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations").fetch_one(&self.pool).await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1;
            if version > current_version {
                let is_multi_statement = migration.contains("BEGIN;") || migration.contains("BEGIN\n");
                let result = if is_multi_statement {
                    sqlx::raw_sql(migration).execute(&self.pool).await.map(|_| ())
                } else {
                    sqlx::query(migration).execute(&self.pool).await.map(|_| ())
                };
                match result {
                    Ok(_) => {}
                    Err(e) if e.to_string().contains("duplicate column name") => {}
                    Err(e) => return Err(e.into()),
                }
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)").bind(version as i64).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Deletes rows from an owned table older than `retention_days`
    /// (measured against `timestamp_column`, a millisecond epoch column).
    /// Returns the number of rows removed.
    pub async fn cleanup_old_data(&self, table: &str, retention_days: u32, timestamp_column: &str) -> DbResult<u64> {
        if !is_owned_table(table) {
            return Ok(0);
        }
        let cutoff = chrono::Utc::now().timestamp_millis() - (retention_days as i64) * 86_400_000;
        let sql = format!("DELETE FROM {table} WHERE {timestamp_column} < ?");
        let result = sqlx::query(&sql).bind(cutoff).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
