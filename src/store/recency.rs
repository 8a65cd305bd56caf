//! Recency List Module
//!
//! Tracks admission/refresh order for eviction priority and replay order.

use std::collections::VecDeque;

// == Recency List ==
/// Tracks keys by time of most recent admission or refresh.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently admitted or refreshed
/// - Back = Least recently admitted or refreshed
///
/// The same ordering drives both eviction priority (evict from the back)
/// and replay order (replay from the front).
#[derive(Debug, Default)]
pub struct RecencyList {
    /// Order of keys by admission/refresh time
    order: VecDeque<String>,
}

impl RecencyList {
    // == Constructor ==
    /// Creates a new empty recency list.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as most recent (moves to front).
    ///
    /// If the key exists it is removed first, then added to the front,
    /// so a refresh of an existing key moves it to the newest position.
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the list.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest ==
    /// Returns and removes the least recent key.
    ///
    /// Returns None if the list is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    // == Peek Oldest ==
    /// Returns the least recent key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.back()
    }

    // == Iteration ==
    /// Iterates keys newest-first (descending recency).
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Iterates keys oldest-first (ascending recency).
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &String> {
        self.order.iter().rev()
    }

    // == Clear ==
    /// Removes all keys from the list.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
