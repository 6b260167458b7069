// crates/analytics-db/src/error.rs
//! Maps `sqlx::Error` onto the shared `AnalyticsError` taxonomy by
//! inspecting the underlying SQLite constraint message, the way the
//! teacher's `DbError` wraps `sqlx::Error` directly but one layer up:
//! here the repository layer must distinguish constraint *classes*
//! rather than surface a single opaque variant.

use analytics_core::AnalyticsError;

pub fn classify(err: sqlx::Error) -> AnalyticsError {
    let message = err.to_string();
    if message.contains("UNIQUE constraint failed") {
        AnalyticsError::AlreadyExists(message)
    } else if message.contains("FOREIGN KEY constraint failed") {
        AnalyticsError::ReferenceMissing(message)
    } else if message.contains("CHECK constraint failed") {
        AnalyticsError::InvalidData(message)
    } else {
        AnalyticsError::Database(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_unique_violation() {
        let err = classify(sqlx::Error::Protocol("UNIQUE constraint failed: t.x".into()));
        assert!(matches!(err, AnalyticsError::AlreadyExists(_)));
    }

    #[test]
    fn classifies_foreign_key_violation() {
        let err = classify(sqlx::Error::Protocol("FOREIGN KEY constraint failed".into()));
        assert!(matches!(err, AnalyticsError::ReferenceMissing(_)));
    }

    #[test]
    fn classifies_check_violation() {
        let err = classify(sqlx::Error::Protocol("CHECK constraint failed: c".into()));
        assert!(matches!(err, AnalyticsError::InvalidData(_)));
    }

    #[test]
    fn falls_back_to_database_error() {
        let err = classify(sqlx::Error::PoolClosed);
        assert!(matches!(err, AnalyticsError::Database(_)));
    }
}
