//! Store Module
//!
//! The bounded key-value capability the channel consumes, plus the bundled
//! LRU implementation.

mod entry;
mod lru;
mod recency;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruStore;
pub use recency::RecencyList;
pub use stats::StoreStats;

use serde_json::Value;

// == Bounded Store Trait ==
/// Capacity- and age-bounded associative store with recency-biased eviction.
///
/// The channel consumes this capability through a narrow interface; any
/// sound bounded-LRU-with-TTL implementation satisfies the contract.
/// [`LruStore`] is the bundled implementation.
///
/// Recency means time of most recent admission or refresh; it drives both
/// eviction priority (least recent goes first) and iteration order.
pub trait BoundedStore: Send {
    /// Admits or refreshes an entry.
    ///
    /// Refreshing resets recency. `ttl_override` replaces the default TTL
    /// for that entry until the next refresh without an override restores
    /// the default; `None` means "use the default".
    fn put(&mut self, key: String, value: Value, ttl_override: Option<u64>);

    /// Retrieves a value, promoting its recency on hit.
    ///
    /// Returns None for missing or expired entries; an expired entry
    /// discovered here is removed and reported to the eviction sink
    /// exactly once.
    fn get(&mut self, key: &str) -> Option<Value>;

    /// Retrieves a value without promoting its recency.
    ///
    /// Same absent/expired semantics as [`BoundedStore::get`].
    fn peek(&mut self, key: &str) -> Option<Value>;

    /// Removes an entry. Explicit removal, never reported as an eviction.
    ///
    /// Returns true if the entry existed.
    fn delete(&mut self, key: &str) -> bool;

    /// Removes all entries. Explicit removal, never reported as evictions.
    fn clear(&mut self);

    /// Changes the capacity (0 = unbounded), discarding least recent
    /// entries if shrinking. Explicit removal, never reported.
    fn resize(&mut self, capacity: usize);

    /// Snapshots live entries oldest-first (ascending recency).
    fn iter_ascending(&mut self) -> Vec<(String, Value)>;

    /// Snapshots live entries newest-first (descending recency).
    fn iter_descending(&mut self) -> Vec<(String, Value)>;

    /// Returns the entry count; may overcount lazily-expired entries
    /// until the next access.
    fn size(&self) -> usize;

    /// Returns store statistics, if the implementation tracks them.
    fn stats(&self) -> StoreStats {
        StoreStats::default()
    }
}
