//! Bounded LRU + TTL store for validated generation results.
//!
//! Two clocks govern an entry:
//!
//! - **TTL** runs from insertion. A hit never refreshes it; only `set`
//!   does. Expired entries are dropped lazily, on the lookup that finds them.
//! - **Recency** is refreshed by every hit and every `set`. When the store
//!   grows past `max_size`, the least-recently-used entry goes first (ties
//!   fall back to insertion order).
//!
//! An entry can therefore be the most recently used one and still expire.
//!
//! Time comes from [`tokio::time::Instant`], so tests drive expiry with a
//! paused runtime clock instead of sleeping.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::debug;

use super::key::CacheKey;
use crate::telemetry;
use crate::{GenError, Result};

/// Limits for a [`CacheStore`].
///
/// ```rust
/// # use genpipe::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(1_000)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries. Default: 500.
    pub max_size: usize,
    /// Maximum age of an entry, measured from insertion. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 500,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Set the time-to-live for entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    pub hit_rate: f64,
}

/// Storage seam used by the orchestrator.
///
/// [`CacheStore`] is the in-memory implementation. Errors from any method
/// are treated as a cache malfunction: the orchestrator logs them and
/// carries on without the cache.
pub trait CacheBackend<V>: Send + Sync {
    /// Look up a live entry. Counts a hit or a miss.
    fn get(&self, key: &CacheKey) -> Result<Option<V>>;

    /// Insert or replace an entry, restarting its TTL.
    fn set(&self, key: CacheKey, value: V) -> Result<()>;

    /// Remove an entry. Absent keys are not an error.
    fn invalidate(&self, key: &CacheKey) -> Result<()>;

    /// Remove every entry and zero the counters.
    fn clear(&self) -> Result<()>;

    fn stats(&self) -> Result<CacheStats>;

    /// Apply new limits. Shrinking `max_size` evicts immediately.
    fn reconfigure(&self, _config: &CacheConfig) -> Result<()> {
        Ok(())
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

struct StoreState<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    config: CacheConfig,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> StoreState<V> {
    fn record_miss(&mut self) {
        self.misses += 1;
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
    }

    /// Pop least-recently-used entries until the size bound holds.
    fn evict_overflow(&mut self) {
        while self.entries.len() > self.config.max_size {
            let Some((key, _)) = self.entries.pop_lru() else {
                break;
            };
            self.evictions += 1;
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            debug!(key = %key, "evicted least recently used entry");
        }
    }
}

/// Thread-safe in-memory cache with LRU eviction and TTL expiry.
///
/// All state lives behind one mutex, so lookups, inserts and the eviction
/// scan are serialised. A poisoned mutex surfaces as [`GenError::Cache`].
pub struct CacheStore<V> {
    state: Mutex<StoreState<V>>,
}

impl<V: Clone> CacheStore<V> {
    /// Create an empty store with the given limits.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            state: Mutex::new(StoreState {
                entries: LruCache::unbounded(),
                config: config.clone(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Number of entries currently held, including expired ones not yet
    /// looked up.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The limits currently in force.
    pub fn config(&self) -> Result<CacheConfig> {
        Ok(self.lock()?.config.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState<V>>> {
        self.state
            .lock()
            .map_err(|e| GenError::Cache(format!("cache lock poisoned: {e}")))
    }
}

impl<V: Clone + Send> CacheBackend<V> for CacheStore<V> {
    fn get(&self, key: &CacheKey) -> Result<Option<V>> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let now = Instant::now();
        let ttl = state.config.ttl;

        let expired = state
            .entries
            .peek(key)
            .map(|entry| now.duration_since(entry.stored_at) > ttl);

        match expired {
            None => {
                state.record_miss();
                Ok(None)
            }
            Some(true) => {
                state.entries.pop(key);
                state.record_miss();
                debug!(key = %key, "dropped expired entry");
                Ok(None)
            }
            Some(false) => {
                state.hits += 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                // `get` (unlike `peek`) promotes the entry to most recently used.
                Ok(state.entries.get(key).map(|entry| entry.value.clone()))
            }
        }
    }

    fn set(&self, key: CacheKey, value: V) -> Result<()> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        state.entries.put(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
        state.evict_overflow();
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.lock()?.entries.pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
        state.evictions = 0;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats> {
        let state = self.lock()?;
        let lookups = state.hits + state.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            state.hits as f64 / lookups as f64
        };
        Ok(CacheStats {
            size: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            hit_rate,
        })
    }

    fn reconfigure(&self, config: &CacheConfig) -> Result<()> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if state.config != *config {
            debug!(max_size = config.max_size, ttl_ms = config.ttl.as_millis() as u64, "cache limits changed");
            state.config = config.clone();
            state.evict_overflow();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(s).unwrap()
    }

    #[test]
    fn hit_rate_zero_without_lookups() {
        let store: CacheStore<u32> = CacheStore::new(&CacheConfig::default());
        let stats = store.stats().unwrap();
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn zero_capacity_evicts_everything() {
        let store = CacheStore::new(&CacheConfig::new().max_size(0));
        store.set(key("a"), 1).unwrap();
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.stats().unwrap().evictions, 1);
        assert!(store.get(&key("a")).unwrap().is_none());
    }

    #[test]
    fn shrinking_limits_evicts_immediately() {
        let store = CacheStore::new(&CacheConfig::new().max_size(3));
        store.set(key("a"), 1).unwrap();
        store.set(key("b"), 2).unwrap();
        store.set(key("c"), 3).unwrap();

        store.reconfigure(&CacheConfig::new().max_size(1)).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&key("c")).unwrap(), Some(3));
        assert_eq!(store.stats().unwrap().evictions, 2);
    }
}
