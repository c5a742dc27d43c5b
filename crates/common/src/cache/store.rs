//! Core cache storage and subscription bookkeeping

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::time::{Clock, SystemClock};

use super::config::CacheConfig;
use super::stats::CacheStats;

/// Handle identifying one registered listener on one key
///
/// Returned by [`ResponseCache::subscribe`] and consumed by
/// [`ResponseCache::unsubscribe`]. Ids are unique for the lifetime of the
/// cache, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<V> = Arc<dyn Fn(Option<&V>) + Send + Sync>;

struct Subscriber<V> {
    id: SubscriptionId,
    listener: Listener<V>,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// An entry is live while its age is at most its TTL.
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }
}

struct Inner<V, C> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    subscribers: Mutex<HashMap<String, Vec<Subscriber<V>>>>,
    next_subscription: AtomicU64,
    clock: C,
    config: CacheConfig,
}

/// Shared TTL cache with per-key change notification
///
/// Cloning is cheap and clones share the same storage and subscriber set.
/// Writes under a key overwrite any previous value, reset the entry's age,
/// and notify that key's listeners with the new value. Removal notifies with
/// `None`.
///
/// Expired entries are dropped on the read path, so a `get` after the TTL
/// has passed behaves exactly like a miss.
///
/// Listeners run without any cache lock held and may call back into the
/// cache, including subscribing or writing from inside a notification.
pub struct ResponseCache<V, C = SystemClock>
where
    V: Clone,
    C: Clock,
{
    inner: Arc<Inner<V, C>>,
}

impl<V, C> Clone for ResponseCache<V, C>
where
    V: Clone,
    C: Clock,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<V> ResponseCache<V, SystemClock>
where
    V: Clone,
{
    /// Create a cache with the given configuration and the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<V, C> ResponseCache<V, C>
where
    V: Clone,
    C: Clock,
{
    /// Create a cache with an injected clock (used by tests)
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                subscribers: Mutex::new(HashMap::new()),
                next_subscription: AtomicU64::new(0),
                clock,
                config,
            }),
        }
    }

    fn entries_read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        // Recover the map on poisoning; entries stay individually consistent
        self.inner.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn entries_write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.inner.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribers_lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscriber<V>>>> {
        self.inner.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a value under `key` with the configured default TTL
    ///
    /// Overwrites any existing entry and resets its age, then notifies the
    /// key's listeners with the new value.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.inner.config.default_ttl);
    }

    /// Store a value under `key` with an explicit TTL
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let stored_at = self.inner.clock.now();
        {
            let mut entries = self.entries_write();
            entries.insert(key.clone(), CacheEntry { value: value.clone(), stored_at, ttl });
        }
        debug!(key = %key, ttl_secs = ttl.as_secs(), "cache entry stored");
        self.notify(&key, Some(&value));
    }

    /// Look up a value; expired entries are evicted and treated as misses
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.inner.clock.now();
        {
            let entries = self.entries_read();
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but expired: upgrade to a write lock and evict.
        // Re-check liveness since another writer may have refreshed it.
        let mut entries = self.entries_write();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(key = %key, "expired cache entry evicted on read");
                None
            }
            None => None,
        }
    }

    /// Remove the entry under `key`, notifying listeners with `None`
    ///
    /// Notification fires whether or not an entry was present, mirroring the
    /// write path.
    pub fn remove(&self, key: &str) {
        {
            let mut entries = self.entries_write();
            entries.remove(key);
        }
        self.notify(key, None);
    }

    /// Drop every entry and every subscription
    ///
    /// No notifications are delivered; the subscriber set is gone along with
    /// the data.
    pub fn clear(&self) {
        {
            let mut entries = self.entries_write();
            entries.clear();
        }
        let mut subscribers = self.subscribers_lock();
        subscribers.clear();
    }

    /// Register a listener for changes under `key`
    ///
    /// The listener is invoked immediately with the current live value (or
    /// not at all if the key is a miss), then on every subsequent write or
    /// removal of that key until unsubscribed.
    pub fn subscribe(
        &self,
        key: impl Into<String>,
        listener: impl Fn(Option<&V>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let key = key.into();
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));

        // Immediate delivery of the current value, before registration, so a
        // concurrent write cannot produce a duplicate first call
        if let Some(value) = self.get(&key) {
            invoke_listener(&key, &listener, Some(&value));
        }

        let mut subscribers = self.subscribers_lock();
        subscribers
            .entry(key)
            .or_default()
            .push(Subscriber { id, listener: Arc::new(listener) });
        id
    }

    /// Remove one listener; unknown ids are ignored
    pub fn unsubscribe(&self, key: &str, id: SubscriptionId) {
        let mut subscribers = self.subscribers_lock();
        if let Some(list) = subscribers.get_mut(key) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(key);
            }
        }
    }

    /// Evict every expired entry, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = self.inner.clock.now();
        let mut entries = self.entries_write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "cache sweep evicted expired entries");
        }
        evicted
    }

    /// Current occupancy counts
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries_read().len();
        let subscribers = self.subscribers_lock().values().map(Vec::len).sum();
        CacheStats { entries, subscribers }
    }

    fn notify(&self, key: &str, value: Option<&V>) {
        // Snapshot the listeners and release the lock before invoking, so a
        // listener may call back into the cache without deadlocking
        let listeners: Vec<Listener<V>> = {
            let subscribers = self.subscribers_lock();
            match subscribers.get(key) {
                Some(list) => list.iter().map(|s| Arc::clone(&s.listener)).collect(),
                None => return,
            }
        };
        for listener in listeners {
            invoke_listener(key, &*listener, value);
        }
    }
}

/// Run one listener, containing any panic so the remaining listeners and the
/// caller are unaffected.
fn invoke_listener<V, F>(key: &str, listener: &F, value: Option<&V>)
where
    F: Fn(Option<&V>) + ?Sized,
{
    if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
        warn!(key = %key, "cache listener panicked during notification");
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the response cache.
    use std::sync::atomic::AtomicUsize;

    use crate::time::MockClock;

    use super::*;

    fn cache_with_clock() -> (ResponseCache<String, MockClock>, MockClock) {
        let clock = MockClock::new();
        let cache = ResponseCache::with_clock(CacheConfig::default(), clock.clone());
        (cache, clock)
    }

    /// Validates `ResponseCache::set` behavior for the basic store and
    /// retrieve scenario.
    ///
    /// Assertions:
    /// - Confirms `cache.get("k")` equals `Some("v")`.
    /// - Confirms a missing key returns `None`.
    #[test]
    fn test_set_and_get() {
        let (cache, _clock) = cache_with_clock();

        cache.set("k", "v".to_string());

        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.get("missing"), None);
    }

    /// Validates `ResponseCache::get` behavior for the TTL expiry scenario.
    ///
    /// Assertions:
    /// - Confirms the value is present just inside the TTL.
    /// - Confirms the value is still present when the age equals the TTL
    ///   exactly (the boundary is inclusive).
    /// - Confirms the value is absent just past the TTL.
    /// - Confirms the expired entry was evicted from storage.
    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock();

        cache.set_with_ttl("k", "v".to_string(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().entries, 0);
    }

    /// Validates `ResponseCache::set` behavior for the overwrite scenario.
    ///
    /// Assertions:
    /// - Confirms the second write replaces the first value.
    /// - Confirms overwriting resets the entry age.
    #[test]
    fn test_overwrite_resets_age() {
        let (cache, clock) = cache_with_clock();

        cache.set_with_ttl("k", "old".to_string(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(50));

        cache.set_with_ttl("k", "new".to_string(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.get("k"), Some("new".to_string()));
    }

    /// Validates `ResponseCache::subscribe` behavior for the immediate
    /// delivery scenario.
    ///
    /// Assertions:
    /// - Confirms the listener fires once with the current value on
    ///   subscription.
    /// - Confirms no immediate call happens for a missing key.
    #[test]
    fn test_subscribe_immediate_delivery() {
        let (cache, _clock) = cache_with_clock();
        cache.set("k", "v".to_string());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        cache.subscribe("k", move |value| {
            assert_eq!(value, Some(&"v".to_string()));
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let miss_calls = Arc::new(AtomicUsize::new(0));
        let miss_calls2 = Arc::clone(&miss_calls);
        cache.subscribe("missing", move |_| {
            miss_calls2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(miss_calls.load(Ordering::SeqCst), 0);
    }

    /// Validates `ResponseCache::set` behavior for the notify-on-write
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms each write notifies the listener with the new value.
    /// - Confirms removal notifies with `None`.
    #[test]
    fn test_notifications_on_write_and_remove() {
        let (cache, _clock) = cache_with_clock();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        cache.subscribe("k", move |value| {
            seen2.lock().unwrap().push(value.cloned());
        });

        cache.set("k", "a".to_string());
        cache.set("k", "b".to_string());
        cache.remove("k");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![Some("a".to_string()), Some("b".to_string()), None]
        );
    }

    /// Validates `ResponseCache::set` behavior for the unrelated key
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a write to a different key does not notify the listener.
    #[test]
    fn test_no_notification_for_other_keys() {
        let (cache, _clock) = cache_with_clock();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        cache.subscribe("k", move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        cache.set("other", "v".to_string());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Validates `ResponseCache::subscribe` behavior for the notification
    /// order scenario.
    ///
    /// Assertions:
    /// - Confirms listeners fire in registration order.
    #[test]
    fn test_notification_order() {
        let (cache, _clock) = cache_with_clock();

        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order2 = Arc::clone(&order);
            cache.subscribe("k", move |_| {
                order2.lock().unwrap().push(tag);
            });
        }

        cache.set("k", "v".to_string());

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    /// Validates `ResponseCache::unsubscribe` behavior for the unsubscribe
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the removed listener no longer fires.
    /// - Confirms the remaining listener still fires.
    /// - Confirms an unknown id is ignored.
    #[test]
    fn test_unsubscribe() {
        let (cache, _clock) = cache_with_clock();

        let a_calls = Arc::new(AtomicUsize::new(0));
        let a_calls2 = Arc::clone(&a_calls);
        let a = cache.subscribe("k", move |_| {
            a_calls2.fetch_add(1, Ordering::SeqCst);
        });

        let b_calls = Arc::new(AtomicUsize::new(0));
        let b_calls2 = Arc::clone(&b_calls);
        cache.subscribe("k", move |_| {
            b_calls2.fetch_add(1, Ordering::SeqCst);
        });

        cache.unsubscribe("k", a);
        cache.unsubscribe("k", SubscriptionId(999));
        cache.set("k", "v".to_string());

        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    /// Validates `ResponseCache::clear` behavior for the clear scenario.
    ///
    /// Assertions:
    /// - Confirms entries and subscriptions are both gone.
    /// - Confirms cleared listeners do not fire on later writes.
    #[test]
    fn test_clear_drops_entries_and_subscriptions() {
        let (cache, _clock) = cache_with_clock();
        cache.set("k", "v".to_string());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        cache.subscribe("k", move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        let calls_before = calls.load(Ordering::SeqCst);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats { entries: 0, subscribers: 0 });

        cache.set("k", "v2".to_string());
        assert_eq!(calls.load(Ordering::SeqCst), calls_before);
    }

    /// Validates `ResponseCache::sweep` behavior for the bulk eviction
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms only expired entries are evicted.
    /// - Confirms the eviction count is returned.
    #[test]
    fn test_sweep_evicts_only_expired() {
        let (cache, clock) = cache_with_clock();

        cache.set_with_ttl("short", "a".to_string(), Duration::from_secs(10));
        cache.set_with_ttl("long", "b".to_string(), Duration::from_secs(100));

        clock.advance(Duration::from_secs(30));

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some("b".to_string()));
    }

    /// Validates `ResponseCache::set` behavior for the panicking listener
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a panic in one listener does not prevent later listeners
    ///   from firing.
    /// - Confirms the write itself succeeds.
    #[test]
    fn test_listener_panic_is_contained() {
        let (cache, _clock) = cache_with_clock();

        cache.subscribe("k", |_| panic!("listener failure"));

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        cache.subscribe("k", move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        cache.set("k", "v".to_string());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    /// Validates `ResponseCache::notify` behavior for the re-entrant
    /// listener scenario.
    ///
    /// Assertions:
    /// - Confirms a listener that subscribes to another key during
    ///   notification does not block the triggering write.
    /// - Confirms the nested subscription is registered and fires on a
    ///   later write.
    /// - Confirms a listener reading cache state during notification
    ///   completes as well.
    #[test]
    fn test_listener_may_reenter_cache() {
        let (cache, _clock) = cache_with_clock();

        let nested_calls = Arc::new(AtomicUsize::new(0));
        let nested_calls2 = Arc::clone(&nested_calls);
        let handle = cache.clone();
        cache.subscribe("k", move |_| {
            let nested_calls3 = Arc::clone(&nested_calls2);
            handle.subscribe("other", move |_| {
                nested_calls3.fetch_add(1, Ordering::SeqCst);
            });
        });

        let stats_handle = cache.clone();
        cache.subscribe("k", move |_| {
            let _ = stats_handle.stats();
            let _ = stats_handle.get("k");
        });

        cache.set("k", "v".to_string());
        cache.set("other", "w".to_string());

        assert_eq!(nested_calls.load(Ordering::SeqCst), 1);
    }

    /// Validates `ResponseCache::clone` behavior for the shared storage
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a write through one clone is visible through the other.
    #[test]
    fn test_clones_share_storage() {
        let (cache, _clock) = cache_with_clock();
        let other = cache.clone();

        cache.set("k", "v".to_string());

        assert_eq!(other.get("k"), Some("v".to_string()));
    }

    /// Validates `ResponseCache::stats` behavior for the occupancy counting
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `entries` and `subscribers` reflect current occupancy.
    #[test]
    fn test_stats() {
        let (cache, _clock) = cache_with_clock();

        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.subscribe("a", |_| {});
        cache.subscribe("a", |_| {});
        cache.subscribe("b", |_| {});

        assert_eq!(cache.stats(), CacheStats { entries: 2, subscribers: 3 });
    }
}
