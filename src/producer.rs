//! Shared Producer Module
//!
//! Reference-counted wrapper that lazily subscribes an upstream producer
//! when the first consumer attaches and releases the subscription when the
//! last consumer detaches, so many consumers share one upstream computation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::channel::{DetachHandle, ReplayChannel};
use crate::consumer::Consumer;
use crate::error::{ReplayError, Result};

// == Upstream Boundary ==
/// Callback record handed to an upstream producer on subscribe.
pub struct UpstreamHandlers {
    /// Invoked once per upstream emission
    pub on_next: Box<dyn FnMut(Value) + Send>,
    /// Invoked if the upstream fails; the message describes the failure
    pub on_error: Box<dyn FnMut(String) + Send>,
    /// Invoked when the upstream completes
    pub on_complete: Box<dyn FnMut() + Send>,
}

/// Handle releasing an upstream subscription.
pub trait Subscription: Send {
    /// Releases the subscription. Called at most once by the wrapper.
    fn unsubscribe(&mut self) -> Result<()>;
}

/// An upstream source of values.
///
/// Implementations may emit synchronously during subscribe or hand the
/// callbacks to a background task and emit later.
pub trait Producer: Send + Sync {
    /// Starts the upstream computation, wiring its output to `handlers`.
    fn subscribe(&self, handlers: UpstreamHandlers) -> Box<dyn Subscription>;
}

// == Share State ==
/// Refcount + subscription slot guarded by one mutex.
///
/// Invariant: `subscription` is present iff `consumer_count > 0`, except
/// during the window after the upstream terminates and before the last
/// consumer detaches.
struct ShareState {
    subscription: Option<Box<dyn Subscription>>,
    consumer_count: usize,
}

// == Shared Producer ==
/// Multiplexes one upstream producer over many channel consumers.
///
/// At most one live upstream subscription exists per instance regardless
/// of consumer churn, and no subscription outlives its last consumer.
/// Once the upstream has terminated, the channel is terminal and no new
/// subscription is created; later attaches still replay cached values
/// followed by the terminal signal.
#[derive(Clone)]
pub struct SharedProducer {
    channel: ReplayChannel,
    producer: Arc<dyn Producer>,
    shared: Arc<Mutex<ShareState>>,
}

impl SharedProducer {
    // == Constructor ==
    /// Wraps an upstream producer around a channel.
    pub fn new(channel: ReplayChannel, producer: Arc<dyn Producer>) -> Self {
        Self {
            channel,
            producer,
            shared: Arc::new(Mutex::new(ShareState {
                subscription: None,
                consumer_count: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShareState> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Attach ==
    /// Attaches a consumer to the shared output.
    ///
    /// The consumer receives the channel's snapshot replay first. The first
    /// attach on a non-terminal channel subscribes the upstream producer:
    /// its emissions feed `publish`, its failure feeds `fail`, its
    /// completion feeds `close`.
    pub fn attach(&self, consumer: Consumer) -> Result<SharedDetachHandle> {
        let handle = self.channel.attach(consumer)?;

        let mut shared = self.lock();
        shared.consumer_count += 1;

        if shared.consumer_count == 1
            && shared.subscription.is_none()
            && !self.channel.is_terminal()
        {
            info!("First consumer attached, subscribing upstream");
            let subscription = self.producer.subscribe(self.make_handlers());
            shared.subscription = Some(subscription);
        }

        Ok(SharedDetachHandle {
            handle,
            shared: self.shared.clone(),
            released: false,
        })
    }

    fn make_handlers(&self) -> UpstreamHandlers {
        let next_channel = self.channel.clone();
        let error_channel = self.channel.clone();
        let complete_channel = self.channel.clone();

        UpstreamHandlers {
            on_next: Box::new(move |value| {
                if let Err(e) = next_channel.publish(value) {
                    warn!("Dropped upstream emission: {}", e);
                }
            }),
            on_error: Box::new(move |message| {
                error!("Upstream producer failed: {}", message);
                error_channel.fail(ReplayError::Upstream(message));
            }),
            on_complete: Box::new(move || {
                debug!("Upstream producer completed");
                complete_channel.close();
            }),
        }
    }

    // == Observers ==
    /// Returns the number of consumers currently attached via this wrapper.
    pub fn consumer_count(&self) -> usize {
        self.lock().consumer_count
    }

    /// Returns true while an upstream subscription is held.
    pub fn is_subscribed(&self) -> bool {
        self.lock().subscription.is_some()
    }

    /// Returns the wrapped channel.
    pub fn channel(&self) -> &ReplayChannel {
        &self.channel
    }
}

// == Shared Detach Handle ==
/// Detaches its consumer and releases the upstream subscription when the
/// consumer count returns to zero.
pub struct SharedDetachHandle {
    handle: DetachHandle,
    shared: Arc<Mutex<ShareState>>,
    released: bool,
}

impl SharedDetachHandle {
    /// Detaches the consumer. Idempotent; always succeeds from the
    /// caller's perspective, teardown failures are logged and swallowed.
    pub fn detach(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.handle.detach();

        let mut shared = self
            .shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        shared.consumer_count = shared.consumer_count.saturating_sub(1);

        if shared.consumer_count == 0 {
            if let Some(mut subscription) = shared.subscription.take() {
                info!("Last consumer detached, releasing upstream subscription");
                release_subscription(&mut subscription);
            }
        }
    }

    /// Returns true once the handle has been released.
    pub fn is_detached(&self) -> bool {
        self.released
    }
}

/// Best-effort teardown: failures and panics are logged, never propagated
/// to the detaching consumer.
fn release_subscription(subscription: &mut Box<dyn Subscription>) {
    match catch_unwind(AssertUnwindSafe(|| subscription.unsubscribe())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Upstream teardown failed: {}", e),
        Err(_) => warn!("Upstream teardown panicked"),
    }
}
