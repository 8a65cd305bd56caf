//! Replay Cache - a bounded replayable multicast cache
//!
//! A capacity- and age-bounded cache whose contents can be replayed,
//! newest-first, to any consumer that attaches later, multiplexed over a
//! single reference-counted upstream producer so many consumers share one
//! upstream computation.

pub mod channel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod key;
pub mod producer;
pub mod sink;
pub mod store;

pub use channel::{DetachHandle, ReplayChannel};
pub use config::ChannelConfig;
pub use consumer::Consumer;
pub use error::{ReplayError, Result};
pub use key::KeyDeriver;
pub use producer::{Producer, SharedDetachHandle, SharedProducer, Subscription, UpstreamHandlers};
pub use sink::{CollectingSink, EvictionSink, LoggingSink};
pub use store::{BoundedStore, LruStore, StoreStats};
