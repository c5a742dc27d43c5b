//! Response cache with TTL expiry and change notification
//!
//! A process-wide store for backend responses. Entries expire after a
//! per-entry TTL and are evicted lazily on read or in bulk via
//! [`ResponseCache::sweep`]. Interested parties can subscribe to a key and
//! are notified whenever the value under that key is written or removed.

mod config;
mod stats;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder, DEFAULT_TTL};
pub use stats::CacheStats;
pub use store::{ResponseCache, SubscriptionId};
