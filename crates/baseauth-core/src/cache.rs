/*
[INPUT]:  Key/value pairs with a per-entry time-to-live
[OUTPUT]: Expiring in-memory lookups with lazy eviction
[POS]:    Caching layer - shared by name resolution and avatar loading
[UPDATE]: When eviction strategy or entry metadata changes
*/

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// A cached value with its storage time and time-to-live.
///
/// An entry is valid iff `now < stored_at + ttl`; anything else is treated
/// as absent and evicted on the next lookup.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.stored_at + self.ttl
    }
}

/// Generic expiring key→value store.
///
/// One mutex per store instance; call volume is human-triggered auth
/// actions, so contention is not a concern. The lock covers only the map
/// access and is never held across an await point. Different entity types
/// never share a store - the resolver and the avatar loader each own one.
pub struct TtlCache<K, V> {
    name: &'static str,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key, lazily evicting it if expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Utc::now()) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(cache = self.name, "evicted expired entry");
                None
            }
            None => None,
        }
    }

    /// Store a value, overwriting any existing entry unconditionally.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Utc::now(),
            ttl,
        };
        self.entries.lock().unwrap().insert(key, entry);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        debug!(cache = self.name, "cleared");
    }

    /// Drop only entries past their TTL.
    pub fn clear_expired(&self) {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(cache = self.name, removed, "evicted expired entries");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backdate(cache: &TtlCache<String, i32>, key: &str, by: Duration) {
        let mut entries = cache.entries.lock().unwrap();
        let entry = entries.get_mut(&key.to_string()).unwrap();
        entry.stored_at -= by;
    }

    #[test]
    fn test_round_trip() {
        let cache: TtlCache<String, i32> = TtlCache::new("test");
        cache.put("a".to_string(), 1, Duration::hours(1));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_missing_key() {
        let cache: TtlCache<String, i32> = TtlCache::new("test");
        assert_eq!(cache.get(&"missing".to_string()), None);
    }

    #[test]
    fn test_put_overwrites() {
        let cache: TtlCache<String, i32> = TtlCache::new("test");
        cache.put("a".to_string(), 1, Duration::hours(1));
        cache.put("a".to_string(), 2, Duration::hours(1));
        assert_eq!(cache.get(&"a".to_string()), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted() {
        let cache: TtlCache<String, i32> = TtlCache::new("test");
        cache.put("a".to_string(), 1, Duration::hours(1));
        backdate(&cache, "a", Duration::hours(2));

        assert_eq!(cache.get(&"a".to_string()), None);
        // Lazy eviction removed the entry on read
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_expired_keeps_live_entries() {
        let cache: TtlCache<String, i32> = TtlCache::new("test");
        cache.put("old".to_string(), 1, Duration::hours(1));
        cache.put("fresh".to_string(), 2, Duration::hours(1));
        backdate(&cache, "old", Duration::hours(2));

        cache.clear_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"fresh".to_string()), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache: TtlCache<String, i32> = TtlCache::new("test");
        cache.put("a".to_string(), 1, Duration::hours(1));
        cache.put("b".to_string(), 2, Duration::hours(1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_valid_until_exact_ttl_boundary() {
        let entry = CacheEntry {
            value: 1,
            stored_at: Utc::now(),
            ttl: Duration::hours(1),
        };
        let boundary = entry.stored_at + entry.ttl;
        assert!(!entry.is_expired(boundary - Duration::seconds(1)));
        assert!(entry.is_expired(boundary));
    }
}
