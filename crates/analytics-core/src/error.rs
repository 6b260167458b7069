// crates/analytics-core/src/error.rs
use thiserror::Error;

/// The error taxonomy shared by the engine and repositories (§7 of the
/// design doc). Every public call that can fail returns one of these —
/// never a raw `sqlx::Error` or SQL text.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("referenced row missing: {0}")]
    ReferenceMissing(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("processing cancelled after deadline")]
    Cancelled,

    #[error("batch completed with {failed} of {total} items failing")]
    PartialFailure { failed: usize, total: usize },
}

impl AnalyticsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}

/// Errors surfaced by a `ConversationSource` implementation. Kept
/// separate from `AnalyticsError` because the source is an external
/// collaborator (§1) whose failure modes (network, permissions) are not
/// the engine's own.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("conversation source unavailable: {0}")]
    Unavailable(String),

    #[error("conversation source returned malformed data: {0}")]
    Malformed(String),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
