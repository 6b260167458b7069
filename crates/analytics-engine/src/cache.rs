// crates/analytics-engine/src/cache.rs
//! The Engine's in-memory report cache: a composite-keyed map from
//! `report:{format}:{range_hash}` to `{data, expires_at}`. Process-local,
//! never persisted, and constructed fresh per `AnalyticsEngine` instance
//! so two engines on the same store never share a cache (§9, "Global
//! mutable state").

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use analytics_types::TimeRange;

use crate::report::{Report, ReportFormat};

fn range_hash(range: TimeRange) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    range.start.hash(&mut hasher);
    range.end.hash(&mut hasher);
    hasher.finish()
}

pub fn cache_key(format: ReportFormat, range: TimeRange) -> String {
    format!("report:{}:{:x}", format.as_str(), range_hash(range))
}

struct Entry {
    data: Report,
    expires_at: Instant,
}

/// A process-local TTL cache. Mutex-guarded rather than `RwLock`: every
/// access (even a read) may purge expired entries, so there is no
/// read-only path worth special-casing.
pub struct ReportCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached report for `key` unless it has expired, purging
    /// it in that case ("stale entries are purged on access").
    pub fn get(&self, key: &str) -> Option<Report> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, data: Report) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, Entry { data, expires_at: Instant::now() + self.ttl });
    }

    /// Removes every key containing `pattern` as a substring.
    pub fn invalidate(&self, pattern: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key, _| !key.contains(pattern));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ConversationMetrics, DecisionMetrics, KnowledgeGapMetrics, ProductivityInsights};

    fn sample_report() -> Report {
        Report {
            format: ReportFormat::Summary,
            range: TimeRange::new(0, 1000),
            conversation_metrics: ConversationMetrics::default(),
            productivity_insights: ProductivityInsights::default(),
            knowledge_gap_metrics: KnowledgeGapMetrics::default(),
            decision_metrics: DecisionMetrics::default(),
            recommendations: Vec::new(),
            insights: Vec::new(),
            generated_at: 0,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ReportCache::new(Duration::from_secs(60));
        let key = cache_key(ReportFormat::Summary, TimeRange::new(0, 1000));
        cache.put(key.clone(), sample_report());
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn expired_entry_is_purged_on_access() {
        let cache = ReportCache::new(Duration::from_millis(1));
        let key = cache_key(ReportFormat::Summary, TimeRange::new(0, 1000));
        cache.put(key.clone(), sample_report());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_keys_containing_pattern() {
        let cache = ReportCache::new(Duration::from_secs(60));
        let summary_key = cache_key(ReportFormat::Summary, TimeRange::new(0, 1000));
        let detailed_key = cache_key(ReportFormat::Detailed, TimeRange::new(0, 1000));
        cache.put(summary_key.clone(), sample_report());
        cache.put(detailed_key.clone(), sample_report());

        cache.invalidate("summary");
        assert!(cache.get(&summary_key).is_none());
        assert!(cache.get(&detailed_key).is_some());
    }

    #[test]
    fn different_ranges_hash_to_different_keys() {
        let a = cache_key(ReportFormat::Summary, TimeRange::new(0, 1000));
        let b = cache_key(ReportFormat::Summary, TimeRange::new(0, 2000));
        assert_ne!(a, b);
    }
}
