// crates/analytics-db/src/batch.rs
//! The capability set shared by every repository: chunking, conflict
//! policy, and rollback-threshold bookkeeping for batch writes. Each
//! repository composes these helpers around its own typed SQL rather
//! than going through one dynamic `(table, records)` executor — a small
//! interface plus composition, not an inheritance chain.

/// How a batch insert should behave when a row collides with an existing
/// unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Silently skip rows that already exist.
    Ignore,
    /// Overwrite the existing row.
    Replace,
    /// Surface the constraint failure as an error.
    Fail,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub conflict: ConflictPolicy,
    pub enable_rollback: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { batch_size: 100, conflict: ConflictPolicy::Ignore, enable_rollback: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Fraction of a chunk that may fail before `enable_rollback` aborts the
/// whole transaction.
const ROLLBACK_FAILURE_RATE: f64 = 0.10;

pub fn should_abort(enable_rollback: bool, failed_in_chunk: usize, chunk_len: usize) -> bool {
    enable_rollback && chunk_len > 0 && (failed_in_chunk as f64 / chunk_len as f64) > ROLLBACK_FAILURE_RATE
}

/// Splits `records` into `batch_size`-sized groups, the unit a single
/// transaction is opened for.
pub fn chunked<T>(records: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    records.chunks(batch_size.max(1))
}

/// Progress callback signature used across batch operations:
/// `(processed, total)`.
pub type ProgressFn<'a> = dyn FnMut(usize, usize) + Send + 'a;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_threshold_is_exclusive_of_exactly_ten_percent() {
        assert!(!should_abort(true, 1, 10));
        assert!(should_abort(true, 2, 10));
    }

    #[test]
    fn disabled_rollback_never_aborts() {
        assert!(!should_abort(false, 9, 10));
    }

    #[test]
    fn chunked_splits_into_requested_sizes() {
        let records = vec![1, 2, 3, 4, 5];
        let chunks: Vec<&[i32]> = chunked(&records, 2).collect();
        assert_eq!(chunks, vec![&[1, 2][..], &[3, 4][..], &[5][..]]);
    }
}
