use std::{
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use log::trace;

use super::{store::age, TimeProvider};

pub const DEFAULT_MAX_ENTRIES: usize = 100;
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolutionCacheStatistics {
    pub hits: u64,
    /// Resolutions that had to reach the repositories.
    pub reads: u64,
    pub average_read_time: Duration,
}

struct Entry<V> {
    value: V,
    inserted_at: u64,
    sequence: u64,
}

/// A small, short-lived memo of resolution results, bounded in size and age.
///
/// Concurrent lookups of the same key share one computation. Eviction happens on insert.
pub struct ResolutionCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    in_flight: DashMap<K, Arc<OnceLock<V>>>,
    max_entries: usize,
    ttl: Duration,
    clock: Arc<dyn TimeProvider>,
    sequence: AtomicU64,
    hits: AtomicU64,
    reads: AtomicU64,
    read_nanos: AtomicU64,
}

impl<K, V> ResolutionCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize, ttl: Duration, clock: Arc<dyn TimeProvider>) -> Self {
        ResolutionCache {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            max_entries,
            ttl,
            clock,
            sequence: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            read_nanos: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();
        let value = self
            .entries
            .get(key)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            self.entries.remove_if(key, |_, entry| !self.is_live(entry, now));
        }
        value
    }

    pub fn insert(&self, key: K, value: V) {
        if self.max_entries == 0 || self.ttl.is_zero() {
            return;
        }
        let now = self.clock.now_millis();
        self.evict(now);
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            },
        );
    }

    /// Returns the cached value for `key`, or runs `compute` and caches its result when
    /// `cacheable` accepts it.
    ///
    /// Callers arriving while the same key is being computed wait for that computation and
    /// receive its value, whether or not it ends up cached.
    pub fn get_or_compute(
        &self,
        key: &K,
        compute: impl FnOnce() -> V,
        cacheable: impl FnOnce(&V) -> bool,
    ) -> V {
        if let Some(value) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value;
        }

        let slot = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();

        let mut computed = false;
        let value = slot
            .get_or_init(|| {
                // The previous computation may have completed between the lookup and the slot.
                if let Some(value) = self.get(key) {
                    return value;
                }
                computed = true;
                let start = Instant::now();
                let value = compute();
                self.reads.fetch_add(1, Ordering::Relaxed);
                self.read_nanos
                    .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
                value
            })
            .clone();

        if computed {
            if cacheable(&value) {
                self.insert(key.clone(), value.clone());
            }
            self.in_flight
                .remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
        } else {
            trace!("Resolution shared with a concurrent request");
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    pub fn statistics(&self) -> ResolutionCacheStatistics {
        let reads = self.reads.load(Ordering::Relaxed);
        let read_nanos = self.read_nanos.load(Ordering::Relaxed);
        ResolutionCacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            reads,
            average_read_time: if reads == 0 {
                Duration::ZERO
            } else {
                Duration::from_nanos(read_nanos / reads)
            },
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn is_live(&self, entry: &Entry<V>, now: u64) -> bool {
        age(entry.inserted_at, now) < self.ttl
    }

    fn evict(&self, now: u64) {
        self.entries.retain(|_, entry| self.is_live(entry, now));
        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.sequence)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualTimeProvider;

    use pretty_assertions::assert_eq;
    use std::{
        sync::{atomic::AtomicUsize, Barrier},
        thread,
    };

    fn cache(
        max_entries: usize,
        ttl: Duration,
    ) -> (ResolutionCache<String, u32>, Arc<ManualTimeProvider>) {
        let clock = Arc::new(ManualTimeProvider::new(0));
        (ResolutionCache::new(max_entries, ttl, clock.clone()), clock)
    }

    fn always(_: &u32) -> bool {
        true
    }

    #[test]
    fn entries_expire_after_ttl() {
        let (cache, clock) = cache(10, Duration::from_secs(10));
        cache.insert("a".to_string(), 1);
        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn oldest_entry_is_evicted_when_full() {
        let (cache, _) = cache(2, Duration::from_secs(10));
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("c".to_string(), 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn computes_once_and_counts_hits() {
        let (cache, _) = cache(10, Duration::from_secs(10));
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        };
        assert_eq!(cache.get_or_compute(&"k".to_string(), compute, always), 7);
        assert_eq!(cache.get_or_compute(&"k".to_string(), compute, always), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let statistics = cache.statistics();
        assert_eq!(statistics.hits, 1);
        assert_eq!(statistics.reads, 1);
    }

    #[test]
    fn rejected_values_are_not_cached() {
        let (cache, _) = cache(10, Duration::from_secs(10));
        let key = "k".to_string();
        assert_eq!(cache.get_or_compute(&key, || 1, |_| false), 1);
        assert_eq!(cache.get_or_compute(&key, || 2, always), 2);
        assert_eq!(cache.get_or_compute(&key, || 3, always), 2);
        assert_eq!(cache.statistics().reads, 2);
    }

    #[test]
    fn concurrent_identical_requests_share_one_computation() {
        let cache = Arc::new(ResolutionCache::<String, u32>::new(
            10,
            Duration::from_secs(10),
            Arc::new(ManualTimeProvider::new(0)),
        ));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    cache.get_or_compute(
                        &"k".to_string(),
                        || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            42
                        },
                        always,
                    )
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.statistics().hits, 7);
    }

    #[test]
    fn concurrent_requests_share_values_that_are_not_cached() {
        let cache = Arc::new(ResolutionCache::<String, u32>::new(
            10,
            Duration::from_secs(10),
            Arc::new(ManualTimeProvider::new(0)),
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_compute(
                        &"k".to_string(),
                        || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(200));
                            13
                        },
                        |_| false,
                    )
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 13);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        // Once the shared computation is over, the next request computes again.
        cache.get_or_compute(&"k".to_string(), || 14, |_| false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.statistics().reads, 2);
    }

    #[test]
    fn disabled_cache_always_computes() {
        let (cache, _) = cache(0, Duration::from_secs(10));
        cache.get_or_compute(&"k".to_string(), || 1, always);
        cache.get_or_compute(&"k".to_string(), || 1, always);
        assert_eq!(cache.statistics().reads, 2);
    }
}
