use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;

/// Anything holding state derived from the replica that must be dropped
/// wholesale before the replica file is refreshed underneath it.
pub trait CacheLayer: Send + Sync {
    fn invalidate_all(&self);
}

/// In-memory query-result cache keyed by query text, with per-entry TTL.
/// Readers get a miss once an entry outlives the TTL; the sync executor
/// clears the whole cache ahead of every pull.
pub struct QueryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    inserted_at: Instant,
    rows: Value,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, query: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(query) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.rows.clone()),
            Some(_) => {
                entries.remove(query);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, query: &str, rows: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            query.to_string(),
            CacheEntry {
                inserted_at: Instant::now(),
                rows,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheLayer for QueryCache {
    fn invalidate_all(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = entries.len();
        entries.clear();
        log::debug!("query cache cleared ({dropped} entries)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_returns_rows() {
        let cache = QueryCache::new(Duration::from_secs(600));
        cache.put("SELECT 1", json!([{"n": 1}]));
        assert_eq!(cache.get("SELECT 1"), Some(json!([{"n": 1}])));
        assert_eq!(cache.get("SELECT 2"), None);
    }

    #[test]
    fn expired_entries_miss_and_evict() {
        let cache = QueryCache::new(Duration::ZERO);
        cache.put("SELECT 1", json!([]));
        assert_eq!(cache.get("SELECT 1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_all_drops_everything() {
        let cache = QueryCache::new(Duration::from_secs(600));
        cache.put("a", json!(1));
        cache.put("b", json!(2));
        assert_eq!(cache.len(), 2);

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
