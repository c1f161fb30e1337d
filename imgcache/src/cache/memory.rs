//! In-memory tier with cost-bounded LRU eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::lru::LruMap;
use crate::cache::stats::StatsRecorder;
use crate::cache::types::{CacheKey, MemoryPressure};

/// Bounded in-process store for decoded images.
///
/// All operations run on the calling thread under a single lock and never
/// fail. After every mutation the total cost is within `max_cost_bytes`.
///
/// Removals and clears advance a generation counter. A disk read captures the
/// generation before it is queued and promotes its result only if nothing was
/// removed or cleared in the meantime.
pub struct MemoryTier<V> {
    entries: Mutex<LruMap<CacheKey, V>>,
    // Only advanced while `entries` is locked
    generation: AtomicU64,
    max_cost_bytes: usize,
    stats: Arc<StatsRecorder>,
}

impl<V: Clone> MemoryTier<V> {
    /// Create a memory tier with the given cost budget.
    pub fn new(max_cost_bytes: usize, stats: Arc<StatsRecorder>) -> Self {
        Self {
            entries: Mutex::new(LruMap::new()),
            generation: AtomicU64::new(0),
            max_cost_bytes,
            stats,
        }
    }

    /// Get an entry, marking it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let found = self.entries.lock().get(key).cloned();
        match found {
            Some(_) => self.stats.record_memory_hit(),
            None => self.stats.record_memory_miss(),
        }
        found
    }

    /// Insert or replace an entry, then evict LRU entries until within budget.
    ///
    /// An entry that alone exceeds the budget is not retained.
    pub fn put(&self, key: CacheKey, value: V, cost: usize) {
        let mut entries = self.entries.lock();

        if cost > self.max_cost_bytes {
            entries.remove(&key);
            drop(entries);
            debug!(
                key = %key,
                cost,
                budget = self.max_cost_bytes,
                "Entry larger than memory budget, not retained"
            );
            return;
        }

        entries.insert(key, value, cost);
        let evicted = Self::evict_until(&mut entries, self.max_cost_bytes);
        drop(entries);

        if evicted > 0 {
            self.stats.record_memory_evictions(evicted);
        }
    }

    /// Current generation, to pass to [`MemoryTier::put_if_absent`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Insert only if the key is not cached and the tier is still at
    /// `generation`.
    ///
    /// Used when promoting a disk hit: a value stored while the read was in
    /// flight is never replaced by the older bytes from disk, and a key
    /// removed or cleared meanwhile is not brought back.
    pub fn put_if_absent(&self, key: CacheKey, value: V, cost: usize, generation: u64) -> bool {
        if cost > self.max_cost_bytes {
            return false;
        }

        let mut entries = self.entries.lock();
        if self.generation.load(Ordering::Acquire) != generation || entries.contains(&key) {
            return false;
        }
        entries.insert(key, value, cost);
        let evicted = Self::evict_until(&mut entries, self.max_cost_bytes);
        drop(entries);

        if evicted > 0 {
            self.stats.record_memory_evictions(evicted);
        }
        true
    }

    /// Remove an entry; absent keys are a no-op.
    pub fn remove(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.remove(key)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }

    /// Shed entries in response to a host memory-pressure signal.
    pub fn on_memory_pressure(&self, level: MemoryPressure) {
        let mut entries = self.entries.lock();
        let before = entries.len() as u64;

        let evicted = match level {
            MemoryPressure::Critical => {
                self.generation.fetch_add(1, Ordering::AcqRel);
                entries.clear();
                before
            }
            MemoryPressure::Moderate => Self::evict_until(&mut entries, self.max_cost_bytes / 2),
        };
        let remaining = entries.total_cost();
        drop(entries);

        self.stats.record_memory_evictions(evicted);
        debug!(?level, evicted, remaining, "Memory tier shed entries under pressure");
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Current total cost in bytes.
    pub fn size_bytes(&self) -> usize {
        self.entries.lock().total_cost()
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_cost_bytes
    }

    fn evict_until(entries: &mut LruMap<CacheKey, V>, target: usize) -> u64 {
        let mut evicted = 0;
        while entries.total_cost() > target {
            if entries.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        evicted
    }
}
