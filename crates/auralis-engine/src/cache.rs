//! Bounded, tagged, single-flight cache.
//!
//! One cache primitive serves two masters: the rendered-chunk cache
//! (keyed by file signature, parameter digest and chunk index) and the
//! catalog's read caches (keyed by query strings). Entries carry:
//!
//! - a byte size, counted against `max_bytes`
//! - a set of group tags, enabling targeted invalidation
//!   (`invalidate_group("favorites")` leaves listings warm)
//! - hit count and last-access time, for LRU eviction and stats
//!
//! `get_or_compute` is single-flight: concurrent callers for the same
//! missing key run exactly one computation while the rest wait on the
//! leader's result.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Cache bounds and expiry.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Total byte budget across all entries.
    pub max_bytes: u64,
    /// Entry count budget.
    pub max_entries: usize,
    /// Entry time-to-live; `None` disables expiry.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024,
            max_entries: 4096,
            ttl: Some(Duration::from_secs(600)),
        }
    }
}

/// Aggregate counters, exposed for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a live entry.
    pub hits: u64,
    /// Lookups that missed (absent or expired).
    pub misses: u64,
    /// Entries evicted for space or count.
    pub evictions: u64,
    /// Current entry count.
    pub entries: usize,
    /// Current byte total.
    pub bytes: u64,
}

struct Entry<V> {
    value: V,
    bytes: u64,
    tags: Vec<String>,
    hits: u64,
    last_access: u64,
    inserted_at: Instant,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    access_seq: u64,
    bytes: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

struct Flight {
    done: Mutex<bool>,
    cv: Condvar,
}

/// The cache. Clone-cheap values (`Arc` payloads) are the intended use.
pub struct TaggedCache<K: Eq + Hash + Clone, V: Clone> {
    config: CacheConfig,
    inner: Mutex<Inner<K, V>>,
    inflight: Mutex<HashMap<K, Arc<Flight>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TaggedCache<K, V> {
    /// Create a cache with the given bounds.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                access_seq: 0,
                bytes: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key, bumping its recency and hit count.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.access_seq += 1;
        let seq = inner.access_seq;
        let ttl = self.config.ttl;

        let expired = match inner.map.get_mut(key) {
            Some(entry) => {
                if ttl.is_some_and(|ttl| entry.inserted_at.elapsed() > ttl) {
                    true
                } else {
                    entry.hits += 1;
                    entry.last_access = seq;
                    inner.hits += 1;
                    return Some(entry.value.clone());
                }
            }
            None => {
                inner.misses += 1;
                return None;
            }
        };
        if expired {
            if let Some(dead) = inner.map.remove(key) {
                inner.bytes -= dead.bytes;
            }
            inner.misses += 1;
        }
        None
    }

    /// Insert a value with its byte size and group tags, evicting LRU
    /// entries as needed to honor the bounds.
    pub fn insert(&self, key: K, value: V, bytes: u64, tags: &[&str]) {
        let mut inner = self.inner.lock();
        inner.access_seq += 1;
        let seq = inner.access_seq;

        if let Some(old) = inner.map.remove(&key) {
            inner.bytes -= old.bytes;
        }
        inner.map.insert(
            key,
            Entry {
                value,
                bytes,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                hits: 0,
                last_access: seq,
                inserted_at: Instant::now(),
            },
        );
        inner.bytes += bytes;
        self.evict_to_bounds(&mut inner);
    }

    /// Drop every entry carrying the given tag. Returns how many went.
    pub fn invalidate_group(&self, tag: &str) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<K> = inner
            .map
            .iter()
            .filter(|(_, e)| e.tags.iter().any(|t| t == tag))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            if let Some(dead) = inner.map.remove(key) {
                inner.bytes -= dead.bytes;
            }
        }
        if !doomed.is_empty() {
            debug!(tag, count = doomed.len(), "invalidated cache group");
        }
        doomed.len()
    }

    /// Full flush. Legal, but targeted invalidation is the intended
    /// path; this exists for maintenance operations.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.bytes = 0;
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.map.len(),
            bytes: inner.bytes,
        }
    }

    /// Whether a key is currently resident (no recency bump).
    pub fn contains(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        inner
            .map
            .get(key)
            .is_some_and(|e| !self.config.ttl.is_some_and(|ttl| e.inserted_at.elapsed() > ttl))
    }

    /// Single-flight lookup: return the cached value, or run `compute`
    /// exactly once across all concurrent callers for this key.
    ///
    /// A failed computation releases waiting callers, each of which will
    /// then attempt the computation itself (the error is not cached).
    pub fn get_or_compute<E>(
        &self,
        key: K,
        tags: &[&str],
        bytes_of: impl Fn(&V) -> u64,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        loop {
            if let Some(hit) = self.get(&key) {
                return Ok(hit);
            }

            // Try to become the leader for this key.
            let flight = {
                let mut inflight = self.inflight.lock();
                match inflight.get(&key) {
                    Some(existing) => {
                        // Follower: wait for the leader, then retry.
                        let flight = Arc::clone(existing);
                        drop(inflight);
                        let mut done = flight.done.lock();
                        while !*done {
                            flight.cv.wait(&mut done);
                        }
                        continue;
                    }
                    None => {
                        let flight = Arc::new(Flight {
                            done: Mutex::new(false),
                            cv: Condvar::new(),
                        });
                        inflight.insert(key.clone(), Arc::clone(&flight));
                        flight
                    }
                }
            };

            // Leader path. Compute outside all cache locks.
            let result = compute();
            if let Ok(value) = &result {
                self.insert(key.clone(), value.clone(), bytes_of(value), tags);
            }

            self.inflight.lock().remove(&key);
            let mut done = flight.done.lock();
            *done = true;
            flight.cv.notify_all();

            return result;
        }
    }

    fn evict_to_bounds(&self, inner: &mut Inner<K, V>) {
        while inner.map.len() > self.config.max_entries
            || inner.bytes > self.config.max_bytes
        {
            // LRU scan. Entry counts stay in the thousands, so the
            // linear scan is not worth a heap.
            let Some(victim) = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(dead) = inner.map.remove(&victim) {
                inner.bytes -= dead.bytes;
                inner.evictions += 1;
            }
        }
    }
}
