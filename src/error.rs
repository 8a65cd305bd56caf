//! Error types for the replay cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Replay Error Enum ==
/// Unified error type for the replay cache.
#[derive(Error, Debug, Clone)]
pub enum ReplayError {
    /// Publish was called with a null-equivalent value; the value is dropped
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Attach was called with a consumer lacking an on_next callback
    #[error("Invalid consumer: {0}")]
    InvalidConsumer(String),

    /// The upstream producer signaled failure
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Releasing the upstream subscription failed during teardown
    #[error("Teardown failure: {0}")]
    Teardown(String),
}

// == Result Type Alias ==
/// Convenience Result type for the replay cache.
pub type Result<T> = std::result::Result<T, ReplayError>;
