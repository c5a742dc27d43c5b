//! Cache statistics

use serde::Serialize;

/// Snapshot of cache occupancy
///
/// `entries` counts stored values regardless of expiry (expired entries are
/// only removed lazily or by `sweep`). `subscribers` counts registered
/// listeners across all keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries, including not-yet-evicted expired ones
    pub entries: usize,
    /// Number of registered listeners across all keys
    pub subscribers: usize,
}
