//! Replay Channel Module
//!
//! The multicast core: owns a bounded store, forwards new values to all
//! attached consumers, and replays the store's contents newest-first to a
//! consumer at attach time.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ChannelConfig;
use crate::consumer::Consumer;
use crate::error::{ReplayError, Result};
use crate::key::KeyDeriver;
use crate::sink::EvictionSink;
use crate::store::{BoundedStore, LruStore, StoreStats};

// == Terminal State ==
/// Recorded terminal signal, redelivered to late-attaching consumers.
#[derive(Debug, Clone)]
enum Terminal {
    Failed(ReplayError),
    Completed,
}

// == Channel State ==
/// State guarded by the channel mutex.
///
/// The mutex is held for the duration of store mutation plus consumer
/// fanout, so attach's snapshot-then-register sequence is atomic with
/// respect to concurrent publishes: a publish arriving between snapshot
/// and registration can be neither lost nor duplicated.
struct ChannelState {
    /// The bounded store owned by this channel
    store: Box<dyn BoundedStore>,
    /// Admission-key derivation strategy
    deriver: KeyDeriver,
    /// Attached consumers with their registration ids
    consumers: Vec<(u64, Consumer)>,
    /// Next registration id to hand out
    next_consumer_id: u64,
    /// Recorded terminal signal, if any
    terminal: Option<Terminal>,
}

// == Replay Channel ==
/// Multicast, replayable event stream over a bounded store.
///
/// Cloning is cheap and shares the same channel. Every value admitted to
/// the store and not yet evicted is replayable; replay order is most
/// recently admitted-or-refreshed first.
#[derive(Clone)]
pub struct ReplayChannel {
    inner: Arc<Mutex<ChannelState>>,
}

impl ReplayChannel {
    // == Constructors ==
    /// Creates a channel over a bundled [`LruStore`] with identity keys.
    pub fn new(config: &ChannelConfig) -> Self {
        Self::with_parts(Box::new(LruStore::from_config(config)), KeyDeriver::Identity)
    }

    /// Creates a channel over a bundled [`LruStore`] wired to an eviction
    /// sink, with identity keys.
    ///
    /// The sink is invoked while the channel lock is held; it must not
    /// call back into the channel.
    pub fn with_sink(config: &ChannelConfig, sink: Arc<dyn EvictionSink>) -> Self {
        let store = LruStore::with_sink(config.capacity, config.default_ttl_ms, sink);
        Self::with_parts(Box::new(store), KeyDeriver::Identity)
    }

    /// Creates a channel from an explicit store and key deriver.
    pub fn with_parts(store: Box<dyn BoundedStore>, deriver: KeyDeriver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelState {
                store,
                deriver,
                consumers: Vec::new(),
                next_consumer_id: 0,
                terminal: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        lock_state(&self.inner)
    }

    // == Publish ==
    /// Admits a value to the store and forwards it to attached consumers.
    ///
    /// Null values fail with [`ReplayError::InvalidValue`] and are dropped.
    /// After the channel has terminated, publishes are silently ignored.
    pub fn publish(&self, value: Value) -> Result<()> {
        self.publish_with_ttl(value, None)
    }

    /// Like [`ReplayChannel::publish`] with a per-entry TTL override in
    /// milliseconds. `None` uses the store default; the override lasts
    /// until the next refresh without one restores the default.
    pub fn publish_with_ttl(&self, value: Value, ttl_override: Option<u64>) -> Result<()> {
        if value.is_null() {
            warn!("Dropping published value: null");
            return Err(ReplayError::InvalidValue(
                "null value cannot be published".to_string(),
            ));
        }

        let mut state = self.lock();
        if state.terminal.is_some() {
            debug!("Ignoring publish on terminal channel");
            return Ok(());
        }

        let key = state.deriver.derive_rendered(&value);
        state.store.put(key, value.clone(), ttl_override);

        for (id, consumer) in state.consumers.iter_mut() {
            deliver_next_isolated(*id, consumer, &value);
        }
        Ok(())
    }

    // == Attach ==
    /// Registers a consumer and replays the store's live contents to it,
    /// newest-first, before returning.
    ///
    /// If the channel is already terminal, the recorded error or completion
    /// signal is delivered immediately after the replay. Fails with
    /// [`ReplayError::InvalidConsumer`] if the consumer has no on_next
    /// callback; channel state is unaffected in that case.
    pub fn attach(&self, consumer: Consumer) -> Result<DetachHandle> {
        if !consumer.has_next() {
            return Err(ReplayError::InvalidConsumer(
                "consumer is missing an on_next callback".to_string(),
            ));
        }

        let mut consumer = consumer;
        let mut state = self.lock();

        let id = state.next_consumer_id;
        state.next_consumer_id += 1;

        // Snapshot replay: live entries, descending recency
        let snapshot = state.store.iter_descending();
        for (_, value) in &snapshot {
            deliver_next_isolated(id, &mut consumer, value);
        }

        match &state.terminal {
            Some(Terminal::Failed(error)) => deliver_error_isolated(id, &mut consumer, error),
            Some(Terminal::Completed) => deliver_complete_isolated(id, &mut consumer),
            None => {}
        }

        state.consumers.push((id, consumer));
        debug!(
            "Consumer {} attached, replayed {} entries",
            id,
            snapshot.len()
        );

        Ok(DetachHandle {
            inner: self.inner.clone(),
            id,
            released: false,
        })
    }

    /// Returns the number of currently attached consumers.
    pub fn consumer_count(&self) -> usize {
        self.lock().consumers.len()
    }

    // == Terminal Transitions ==
    /// Marks the channel terminal with an error and forwards the signal to
    /// every attached consumer. A second terminal transition is a no-op.
    pub fn fail(&self, error: ReplayError) {
        let mut state = self.lock();
        if state.terminal.is_some() {
            debug!("Ignoring fail on terminal channel");
            return;
        }
        warn!("Channel terminated with error: {}", error);
        state.terminal = Some(Terminal::Failed(error.clone()));
        for (id, consumer) in state.consumers.iter_mut() {
            deliver_error_isolated(*id, consumer, &error);
        }
    }

    /// Marks the channel terminal with completion and forwards the signal
    /// to every attached consumer. A second terminal transition is a no-op.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.terminal.is_some() {
            debug!("Ignoring close on terminal channel");
            return;
        }
        debug!("Channel completed");
        state.terminal = Some(Terminal::Completed);
        for (id, consumer) in state.consumers.iter_mut() {
            deliver_complete_isolated(*id, consumer);
        }
    }

    /// Returns true once the channel has terminated.
    pub fn is_terminal(&self) -> bool {
        self.lock().terminal.is_some()
    }

    // == Delegated Store Operations ==
    /// Changes the store capacity (0 = unbounded).
    pub fn resize(&self, capacity: usize) {
        self.lock().store.resize(capacity);
    }

    /// Retrieves a stored value without promoting its recency.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.lock().store.peek(key)
    }

    /// Removes a stored entry; never reported as an eviction.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().store.delete(key)
    }

    /// Removes all stored entries; never reported as evictions.
    pub fn clear(&self) {
        self.lock().store.clear();
    }

    /// Snapshots live entries oldest-first.
    pub fn iter_ascending(&self) -> Vec<(String, Value)> {
        self.lock().store.iter_ascending()
    }

    /// Snapshots live entries newest-first.
    pub fn iter_descending(&self) -> Vec<(String, Value)> {
        self.lock().store.iter_descending()
    }

    /// Returns the store's entry count.
    pub fn size(&self) -> usize {
        self.lock().store.size()
    }

    /// Returns the store's statistics.
    pub fn stats(&self) -> StoreStats {
        self.lock().store.stats()
    }
}

// == Detach Handle ==
/// Removes its consumer from the attached set on release.
///
/// Detaching twice is a no-op. Dropping the handle without calling
/// [`DetachHandle::detach`] leaves the consumer attached.
pub struct DetachHandle {
    inner: Arc<Mutex<ChannelState>>,
    id: u64,
    released: bool,
}

impl DetachHandle {
    /// Removes the consumer from the channel. Idempotent, never blocks on
    /// anything but the channel mutex.
    pub fn detach(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = lock_state(&self.inner);
        state.consumers.retain(|(id, _)| *id != self.id);
        debug!("Consumer {} detached", self.id);
    }

    /// Returns true once the handle has been released.
    pub fn is_detached(&self) -> bool {
        self.released
    }
}

// == Helpers ==
fn lock_state(inner: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Delivers one value, catching consumer panics so one misbehaving
/// consumer cannot block fanout to the others.
fn deliver_next_isolated(id: u64, consumer: &mut Consumer, value: &Value) {
    let result = catch_unwind(AssertUnwindSafe(|| consumer.deliver_next(value)));
    if result.is_err() {
        warn!("Consumer {} panicked during value delivery", id);
    }
}

fn deliver_error_isolated(id: u64, consumer: &mut Consumer, error: &ReplayError) {
    let result = catch_unwind(AssertUnwindSafe(|| consumer.deliver_error(error)));
    if result.is_err() {
        warn!("Consumer {} panicked during error delivery", id);
    }
}

fn deliver_complete_isolated(id: u64, consumer: &mut Consumer) {
    let result = catch_unwind(AssertUnwindSafe(|| consumer.deliver_complete()));
    if result.is_err() {
        warn!("Consumer {} panicked during completion delivery", id);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn unbounded() -> ReplayChannel {
        ReplayChannel::new(&ChannelConfig {
            capacity: 0,
            default_ttl_ms: None,
        })
    }

    fn recording_consumer() -> (Consumer, Arc<StdMutex<Vec<Value>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let consumer = Consumer::new().on_next(move |v| {
            sink.lock().unwrap().push(v.clone());
        });
        (consumer, seen)
    }

    #[test]
    fn test_publish_null_is_rejected() {
        let channel = unbounded();
        let result = channel.publish(Value::Null);
        assert!(matches!(result, Err(ReplayError::InvalidValue(_))));
        assert_eq!(channel.size(), 0);
    }

    #[test]
    fn test_attach_without_on_next_fails() {
        let channel = unbounded();
        let result = channel.attach(Consumer::new());
        assert!(matches!(result, Err(ReplayError::InvalidConsumer(_))));
        assert_eq!(channel.consumer_count(), 0);
    }

    #[test]
    fn test_live_forwarding_in_publish_order() {
        let channel = unbounded();
        let (consumer, seen) = recording_consumer();
        let _handle = channel.attach(consumer).unwrap();

        channel.publish(json!("a")).unwrap();
        channel.publish(json!("b")).unwrap();
        channel.publish(json!("c")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_replay_is_newest_first() {
        let channel = unbounded();
        channel.publish(json!("a")).unwrap();
        channel.publish(json!("b")).unwrap();
        channel.publish(json!("c")).unwrap();

        let (consumer, seen) = recording_consumer();
        let _handle = channel.attach(consumer).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!("c"), json!("b"), json!("a")]);
    }

    #[test]
    fn test_republish_refreshes_instead_of_duplicating() {
        let channel = unbounded();
        channel.publish(json!(1)).unwrap();
        channel.publish(json!(2)).unwrap();
        channel.publish(json!(3)).unwrap();
        channel.publish(json!(3)).unwrap();
        channel.publish(json!(2)).unwrap();

        let ascending: Vec<Value> = channel
            .iter_ascending()
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(ascending, vec![json!(1), json!(3), json!(2)]);

        let descending: Vec<Value> = channel
            .iter_descending()
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(descending, vec![json!(2), json!(3), json!(1)]);
    }

    #[test]
    fn test_detach_stops_delivery_and_is_idempotent() {
        let channel = unbounded();
        let (consumer, seen) = recording_consumer();
        let mut handle = channel.attach(consumer).unwrap();

        channel.publish(json!(1)).unwrap();
        handle.detach();
        handle.detach(); // no-op
        channel.publish(json!(2)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);
        assert_eq!(channel.consumer_count(), 0);
        assert!(handle.is_detached());
    }

    #[test]
    fn test_fail_forwards_error_and_suppresses_publish() {
        let channel = unbounded();
        let errors = Arc::new(StdMutex::new(Vec::new()));
        let sink = errors.clone();
        let consumer = Consumer::new().on_next(|_| {}).on_error(move |e| {
            sink.lock().unwrap().push(e.to_string());
        });
        let _handle = channel.attach(consumer).unwrap();

        channel.publish(json!("before")).unwrap();
        channel.fail(ReplayError::Upstream("boom".to_string()));

        // Post-terminal publishes are silently ignored
        assert!(channel.publish(json!("after")).is_ok());
        assert_eq!(channel.size(), 1);

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("boom"));
    }

    #[test]
    fn test_late_attach_gets_replay_then_terminal_signal() {
        let channel = unbounded();
        channel.publish(json!("a")).unwrap();
        channel.publish(json!("b")).unwrap();
        channel.close();

        let log = Arc::new(StdMutex::new(Vec::new()));
        let next_log = log.clone();
        let complete_log = log.clone();
        let consumer = Consumer::new()
            .on_next(move |v| next_log.lock().unwrap().push(v.to_string()))
            .on_complete(move || complete_log.lock().unwrap().push("complete".to_string()));
        let _handle = channel.attach(consumer).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(*log, vec![r#""b""#, r#""a""#, "complete"]);
    }

    #[test]
    fn test_second_terminal_transition_is_noop() {
        let channel = unbounded();
        let completes = Arc::new(StdMutex::new(0u32));
        let c = completes.clone();
        let consumer = Consumer::new().on_next(|_| {}).on_complete(move || {
            *c.lock().unwrap() += 1;
        });
        let _handle = channel.attach(consumer).unwrap();

        channel.close();
        channel.close();
        channel.fail(ReplayError::Upstream("late".to_string()));

        assert_eq!(*completes.lock().unwrap(), 1);
        assert!(channel.is_terminal());
    }

    #[test]
    fn test_panicking_consumer_does_not_block_fanout() {
        let channel = unbounded();
        let bad = Consumer::new().on_next(|_| panic!("misbehaving consumer"));
        let (good, seen) = recording_consumer();

        let _h1 = channel.attach(bad).unwrap();
        let _h2 = channel.attach(good).unwrap();

        channel.publish(json!(1)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);
    }

    #[test]
    fn test_key_derivation_routes_admission() {
        let store = Box::new(LruStore::new(0, None));
        let channel = ReplayChannel::with_parts(store, KeyDeriver::path("id"));

        channel.publish(json!({"id": "x", "n": 1})).unwrap();
        channel.publish(json!({"id": "x", "n": 2})).unwrap();

        // Same derived key: second publish refreshes the entry
        assert_eq!(channel.size(), 1);
        assert_eq!(channel.peek("x"), Some(json!({"id": "x", "n": 2})));
    }

    #[test]
    fn test_delegated_store_operations() {
        let channel = unbounded();
        channel.publish(json!("a")).unwrap();
        channel.publish(json!("b")).unwrap();

        assert_eq!(channel.size(), 2);
        assert_eq!(channel.peek("a"), Some(json!("a")));
        assert!(channel.delete("a"));
        assert_eq!(channel.size(), 1);

        channel.clear();
        assert_eq!(channel.size(), 0);
    }
}
