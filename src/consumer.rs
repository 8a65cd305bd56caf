//! Consumer Module
//!
//! The capability a subscriber hands to the channel to receive values.

use std::fmt;

use serde_json::Value;

use crate::error::ReplayError;

/// Callback invoked once per delivered value.
pub type NextFn = Box<dyn FnMut(&Value) + Send>;
/// Callback invoked when the channel terminates with an error.
pub type ErrorFn = Box<dyn FnMut(&ReplayError) + Send>;
/// Callback invoked when the channel terminates with completion.
pub type CompleteFn = Box<dyn FnMut() + Send>;

// == Consumer ==
/// Receiving capability for a channel subscriber.
///
/// `on_next` is required; attach fails without it. `on_error` and
/// `on_complete` are optional: a consumer without them opts out of
/// termination signals.
///
/// Delivery to a single consumer is strictly in publish order; ordering
/// across consumers is unspecified.
#[derive(Default)]
pub struct Consumer {
    on_next: Option<NextFn>,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
}

impl Consumer {
    // == Constructor ==
    /// Creates an empty consumer; chain the callback setters to populate it.
    pub fn new() -> Self {
        Self::default()
    }

    // == Callback Setters ==
    /// Sets the value-delivery callback. Required for attach to succeed.
    pub fn on_next<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.on_next = Some(Box::new(f));
        self
    }

    /// Sets the error-termination callback.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ReplayError) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Sets the completion callback.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    // == Delivery ==
    /// Returns true if the consumer can receive values.
    pub(crate) fn has_next(&self) -> bool {
        self.on_next.is_some()
    }

    /// Delivers one value.
    pub(crate) fn deliver_next(&mut self, value: &Value) {
        if let Some(f) = &mut self.on_next {
            f(value);
        }
    }

    /// Delivers the terminal error signal, if the consumer opted in.
    pub(crate) fn deliver_error(&mut self, error: &ReplayError) {
        if let Some(f) = &mut self.on_error {
            f(error);
        }
    }

    /// Delivers the terminal completion signal, if the consumer opted in.
    pub(crate) fn deliver_complete(&mut self) {
        if let Some(f) = &mut self.on_complete {
            f();
        }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("on_next", &self.on_next.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_consumer_has_no_next() {
        let consumer = Consumer::new();
        assert!(!consumer.has_next());
    }

    #[test]
    fn test_deliver_next() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let mut consumer = Consumer::new().on_next(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(consumer.has_next());
        consumer.deliver_next(&json!(1));
        consumer.deliver_next(&json!(2));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_terminal_delivery_without_callbacks_is_noop() {
        let mut consumer = Consumer::new().on_next(|_| {});

        // Consumer opted out of termination signals
        consumer.deliver_error(&ReplayError::Upstream("boom".to_string()));
        consumer.deliver_complete();
    }

    #[test]
    fn test_terminal_callbacks_invoked() {
        let errors = Arc::new(AtomicUsize::new(0));
        let completes = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        let c = completes.clone();

        let mut consumer = Consumer::new()
            .on_next(|_| {})
            .on_error(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            })
            .on_complete(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });

        consumer.deliver_error(&ReplayError::Upstream("boom".to_string()));
        consumer.deliver_complete();

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(completes.load(Ordering::SeqCst), 1);
    }
}
