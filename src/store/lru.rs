//! LRU Store Module
//!
//! Bundled [`BoundedStore`] implementation combining HashMap storage with
//! recency tracking and lazy TTL expiration.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::ChannelConfig;
use crate::sink::EvictionSink;
use crate::store::{BoundedStore, CacheEntry, RecencyList, StoreStats};

// == LRU Store ==
/// Bounded store with least-recently-admitted eviction and TTL support.
///
/// Capacity 0 means unbounded. Expiry is evaluated lazily at access time;
/// there are no background timers, so an entry past its TTL is logically
/// evicted even if physically removed only on the next access.
pub struct LruStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Admission/refresh order tracker
    recency: RecencyList,
    /// Performance statistics
    stats: StoreStats,
    /// Maximum number of entries allowed (0 = unbounded)
    capacity: usize,
    /// Default TTL in milliseconds for entries without an explicit TTL
    default_ttl_ms: Option<u64>,
    /// Receiver for capacity/age eviction notifications
    sink: Option<Arc<dyn EvictionSink>>,
}

impl LruStore {
    // == Constructors ==
    /// Creates a new LruStore with the given capacity and default TTL.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries (0 = unbounded)
    /// * `default_ttl_ms` - Default TTL in milliseconds (None = no expiry)
    pub fn new(capacity: usize, default_ttl_ms: Option<u64>) -> Self {
        Self {
            entries: HashMap::new(),
            recency: RecencyList::new(),
            stats: StoreStats::new(),
            capacity,
            default_ttl_ms,
            sink: None,
        }
    }

    /// Creates a new LruStore that reports evictions to the given sink.
    pub fn with_sink(
        capacity: usize,
        default_ttl_ms: Option<u64>,
        sink: Arc<dyn EvictionSink>,
    ) -> Self {
        let mut store = Self::new(capacity, default_ttl_ms);
        store.sink = Some(sink);
        store
    }

    /// Creates a new LruStore from a channel configuration.
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.capacity, config.default_ttl_ms)
    }

    // == Internal Helpers ==
    /// Reports a store-driven removal (capacity or age) to the sink.
    fn notify_sink(&self, key: &str, value: &Value) {
        if let Some(sink) = &self.sink {
            sink.on_evicted(key, value);
        }
    }

    /// Evicts the least recent entry due to capacity pressure.
    ///
    /// Returns false if there was nothing to evict.
    fn evict_for_capacity(&mut self) -> bool {
        match self.recency.evict_oldest() {
            Some(key) => {
                if let Some(entry) = self.entries.remove(&key) {
                    self.stats.record_eviction();
                    debug!("Capacity eviction: key={}", key);
                    self.notify_sink(&key, &entry.value);
                }
                true
            }
            None => false,
        }
    }

    /// Removes and reports a single entry known to be expired.
    fn expire_entry(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(key);
            self.stats.record_expiration();
            debug!("Age expiry: key={}", key);
            self.notify_sink(key, &entry.value);
        }
    }

    /// Removes all expired entries, reporting each to the sink exactly once.
    ///
    /// Returns the number of entries removed.
    fn sweep_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            self.expire_entry(&key);
        }
        count
    }

    /// Looks up a live entry, removing it first if it turns out expired.
    fn lookup(&mut self, key: &str) -> Option<Value> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.expire_entry(key);
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Collects live entries in the order the given keys appear.
    fn collect_in_order(&self, keys: Vec<String>) -> Vec<(String, Value)> {
        keys.into_iter()
            .filter_map(|key| {
                self.entries
                    .get(&key)
                    .map(|entry| (key.clone(), entry.value.clone()))
            })
            .collect()
    }
}

impl BoundedStore for LruStore {
    /// Admits or refreshes an entry.
    ///
    /// Refreshing resets recency and, absent `ttl_override`, restores the
    /// store's default TTL. If the store is at capacity and the key is new,
    /// the least recent entry is evicted first and reported to the sink.
    fn put(&mut self, key: String, value: Value, ttl_override: Option<u64>) {
        let is_refresh = self.entries.contains_key(&key);

        if !is_refresh && self.capacity > 0 {
            while self.entries.len() >= self.capacity {
                if !self.evict_for_capacity() {
                    break;
                }
            }
        }

        let ttl = ttl_override.or(self.default_ttl_ms);
        self.entries.insert(key.clone(), CacheEntry::new(value, ttl));
        self.recency.touch(&key);
        self.stats.set_total_entries(self.entries.len());
    }

    /// Retrieves a value by key, promoting its recency on hit.
    fn get(&mut self, key: &str) -> Option<Value> {
        let value = self.lookup(key);
        if value.is_some() {
            self.recency.touch(key);
        }
        self.stats.set_total_entries(self.entries.len());
        value
    }

    /// Retrieves a value by key without promoting its recency.
    fn peek(&mut self, key: &str) -> Option<Value> {
        let value = self.lookup(key);
        self.stats.set_total_entries(self.entries.len());
        value
    }

    /// Removes an entry by key. Explicit removal, never reported to the sink.
    fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.recency.remove(key);
        }
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    /// Removes all entries. Explicit removal, never reported to the sink.
    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.stats.set_total_entries(0);
    }

    /// Changes the capacity, discarding least recent entries if shrinking.
    ///
    /// Entries removed by a shrink are operator-directed removals and are
    /// not reported to the sink.
    fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        if capacity > 0 {
            while self.entries.len() > capacity {
                match self.recency.evict_oldest() {
                    Some(key) => {
                        self.entries.remove(&key);
                    }
                    None => break,
                }
            }
        }
        self.stats.set_total_entries(self.entries.len());
    }

    /// Snapshots live entries oldest-first (ascending recency).
    ///
    /// Expired entries discovered during the snapshot are removed and
    /// reported to the sink first.
    fn iter_ascending(&mut self) -> Vec<(String, Value)> {
        self.sweep_expired();
        self.stats.set_total_entries(self.entries.len());
        let keys: Vec<String> = self.recency.iter_oldest_first().cloned().collect();
        self.collect_in_order(keys)
    }

    /// Snapshots live entries newest-first (descending recency).
    fn iter_descending(&mut self) -> Vec<(String, Value)> {
        self.sweep_expired();
        self.stats.set_total_entries(self.entries.len());
        let keys: Vec<String> = self.recency.iter_newest_first().cloned().collect();
        self.collect_in_order(keys)
    }

    /// Returns the entry count, which may overcount lazily-expired entries
    /// until the next access.
    fn size(&self) -> usize {
        self.entries.len()
    }

    /// Returns current store statistics.
    fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }
}
