//! Cache configuration

use std::time::Duration;

/// Default time-to-live applied when `set` is called without an explicit TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Configuration for a [`ResponseCache`](super::ResponseCache)
///
/// Entries stored without an explicit TTL use `default_ttl`. The TTL is
/// inclusive on the valid side: an entry whose age equals its TTL is still
/// served.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to entries stored via `set`
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default_ttl: DEFAULT_TTL }
    }
}

impl CacheConfig {
    /// Create a configuration with the default 5-minute TTL
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Builder for [`CacheConfig`]
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    default_ttl: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set the default TTL for entries stored without an explicit one
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        CacheConfig { default_ttl: self.default_ttl.unwrap_or(DEFAULT_TTL) }
    }
}
