//! Configuration Module
//!
//! Handles channel configuration, loadable from environment variables.

use std::env;

/// Channel configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Maximum number of entries the store can hold (0 = unbounded)
    pub capacity: usize,
    /// Default TTL in milliseconds for entries without an explicit TTL,
    /// None = entries never expire by default
    pub default_ttl_ms: Option<u64>,
}

impl ChannelConfig {
    /// Creates a new ChannelConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REPLAY_CAPACITY` - Maximum store entries, 0 for unbounded (default: 1000)
    /// - `REPLAY_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: no expiry)
    pub fn from_env() -> Self {
        Self {
            capacity: env::var("REPLAY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            default_ttl_ms: env::var("REPLAY_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_ttl_ms: None,
        }
    }
}
