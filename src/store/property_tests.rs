//! Property-Based Tests for the Store Module
//!
//! Uses proptest to verify ordering and bounding invariants of the
//! bundled LruStore.

use proptest::prelude::*;
use serde_json::json;

use crate::store::{BoundedStore, LruStore};

// == Test Configuration ==
const TEST_CAPACITY: usize = 100;

// == Strategies ==
/// Generates valid store keys drawn from a small alphabet so that
/// refreshes of existing keys actually occur in generated sequences.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f][0-9]{0,2}".prop_map(|s| s)
}

/// Generates a sequence of store operations for model testing.
#[derive(Debug, Clone)]
enum StoreOp {
    Put { key: String, n: u64 },
    Get { key: String },
    Delete { key: String },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (key_strategy(), any::<u64>()).prop_map(|(key, n)| StoreOp::Put { key, n }),
        key_strategy().prop_map(|key| StoreOp::Get { key }),
        key_strategy().prop_map(|key| StoreOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Descending iteration is always the exact reverse of ascending
    // iteration, for any operation sequence.
    #[test]
    fn prop_iteration_orders_are_reverses(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let mut store = LruStore::new(TEST_CAPACITY, None);

        for op in ops {
            match op {
                StoreOp::Put { key, n } => store.put(key, json!(n), None),
                StoreOp::Get { key } => { store.get(&key); }
                StoreOp::Delete { key } => { store.delete(&key); }
            }
        }

        let ascending = store.iter_ascending();
        let mut descending = store.iter_descending();
        descending.reverse();
        prop_assert_eq!(ascending, descending);
    }

    // Descending iteration matches a model that tracks the most recent
    // admission, refresh, or promoting lookup of each key.
    #[test]
    fn prop_descending_matches_recency_model(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let mut store = LruStore::new(0, None);
        // Model: front of the vec = newest
        let mut model: Vec<String> = Vec::new();

        for op in ops {
            match op {
                StoreOp::Put { key, n } => {
                    store.put(key.clone(), json!(n), None);
                    model.retain(|k| k != &key);
                    model.insert(0, key);
                }
                StoreOp::Get { key } => {
                    if store.get(&key).is_some() {
                        model.retain(|k| k != &key);
                        model.insert(0, key);
                    }
                }
                StoreOp::Delete { key } => {
                    store.delete(&key);
                    model.retain(|k| k != &key);
                }
            }
        }

        let keys: Vec<String> = store.iter_descending().into_iter().map(|(k, _)| k).collect();
        prop_assert_eq!(keys, model);
    }

    // The store never holds more than its capacity.
    #[test]
    fn prop_size_bounded_by_capacity(
        capacity in 1usize..20,
        ops in prop::collection::vec((key_strategy(), any::<u64>()), 1..100),
    ) {
        let mut store = LruStore::new(capacity, None);

        for (key, n) in ops {
            store.put(key, json!(n), None);
            prop_assert!(store.size() <= capacity);
        }
    }

    // Refreshing a key never changes the entry count, and the refreshed
    // key always ends up in the newest position.
    #[test]
    fn prop_refresh_moves_to_newest(
        keys in prop::collection::vec(key_strategy(), 2..20),
        refresh_index in 0usize..20,
    ) {
        let mut store = LruStore::new(0, None);
        for (i, key) in keys.iter().enumerate() {
            store.put(key.clone(), json!(i), None);
        }
        let size_before = store.size();

        let target = keys[refresh_index % keys.len()].clone();
        store.put(target.clone(), json!("refreshed"), None);

        prop_assert_eq!(store.size(), size_before);
        let newest = store.iter_descending().first().map(|(k, _)| k.clone());
        prop_assert_eq!(newest, Some(target));
    }

    // Statistics track lookup outcomes exactly.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(store_op_strategy(), 1..50)) {
        let mut store = LruStore::new(TEST_CAPACITY, None);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                StoreOp::Put { key, n } => store.put(key, json!(n), None),
                StoreOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                StoreOp::Delete { key } => { store.delete(&key); }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, store.size(), "Total entries mismatch");
    }
}
