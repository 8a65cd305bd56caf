//! Eviction Sink Module
//!
//! Secondary output channel for entries the store removes on its own.
//!
//! The store invokes the sink exactly once per entry removed due to
//! capacity pressure or age expiry. Explicit removals (`delete`, `clear`,
//! `resize`) are user-directed and are never reported here.

use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

// == Eviction Sink Trait ==
/// Receives entries the store evicted due to capacity or age pressure.
pub trait EvictionSink: Send + Sync {
    /// Called exactly once per evicted entry.
    fn on_evicted(&self, key: &str, value: &Value);
}

// == Closure Adapter ==
/// Any `Fn(&str, &Value)` closure can serve as an eviction sink.
impl<F> EvictionSink for F
where
    F: Fn(&str, &Value) + Send + Sync,
{
    fn on_evicted(&self, key: &str, value: &Value) {
        self(key, value)
    }
}

// == Logging Sink ==
/// Eviction sink that logs each evicted entry via tracing.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl EvictionSink for LoggingSink {
    fn on_evicted(&self, key: &str, value: &Value) {
        debug!("Evicted entry: key={}, value={}", key, value);
    }
}

// == Collecting Sink ==
/// Eviction sink that records every notification it receives.
///
/// Useful for observing eviction behavior, e.g. in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    evicted: Mutex<Vec<(String, Value)>>,
}

impl CollectingSink {
    /// Creates a new empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded evictions, in notification order.
    pub fn evicted(&self) -> Vec<(String, Value)> {
        self.evicted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns the number of recorded evictions.
    pub fn len(&self) -> usize {
        self.evicted.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if no evictions have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EvictionSink for CollectingSink {
    fn on_evicted(&self, key: &str, value: &Value) {
        self.evicted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.to_string(), value.clone()));
    }
}
