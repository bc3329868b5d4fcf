//! Byte-budgeted LRU cache
//!
//! Entries are kept in recency order: the front of the map is the least
//! recently used entry, the back is the most recently used. When the
//! aggregate size goes over capacity the cache evicts from the front until
//! it is at or under the low-water mark, so a steady stream of inserts near
//! the boundary doesn't evict on every put.
//!
//! The cache never destroys anything itself. Every value that leaves the
//! cache (eviction, replacement, trim, clear) is handed to the eviction hook
//! supplied at construction.

use std::hash::Hash;

use indexmap::IndexMap;

/// Default low-water mark as a fraction of capacity
pub const DEFAULT_LOW_WATER_RATIO: f32 = 0.75;

/// Called once for every value that leaves the cache.
///
/// Keep it to bookkeeping: the hook runs inside `put`/`trim_to_age`/`clear`.
pub type EvictionHook<K, V> = Box<dyn FnMut(&K, V) + Send>;

/// A cached value with its size and the age it was last touched at
struct CacheEntry<V> {
    value: V,
    size: usize,
    age: u64,
}

/// Cache counters, reset by [`CapacityCache::reset_stats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Values refused because they alone exceed the capacity
    pub rejected: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit (0.0 when nothing was looked up)
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f32 / total as f32
    }
}

/// Byte-budgeted least-recently-used cache
pub struct CapacityCache<K, V> {
    /// Oldest first, newest last
    entries: IndexMap<K, CacheEntry<V>>,
    /// Aggregate size of all entries
    used: usize,
    capacity: usize,
    low_water: usize,
    /// Global age counter, stamped onto entries when they are touched
    age: u64,
    on_evicted: EvictionHook<K, V>,
    stats: CacheStats,
}

impl<K, V> CapacityCache<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    /// Create a cache
    ///
    /// # Arguments
    /// * `capacity` - Maximum aggregate size in bytes
    /// * `low_water` - Size eviction drains down to; clamped to `capacity`
    /// * `on_evicted` - Receives every value leaving the cache
    pub fn new(capacity: usize, low_water: usize, on_evicted: EvictionHook<K, V>) -> Self {
        Self {
            entries: IndexMap::new(),
            used: 0,
            capacity,
            low_water: low_water.min(capacity),
            age: 0,
            on_evicted,
            stats: CacheStats::default(),
        }
    }

    /// Create a cache with the default low-water ratio
    pub fn with_capacity(capacity: usize, on_evicted: EvictionHook<K, V>) -> Self {
        let low_water = (capacity as f64 * DEFAULT_LOW_WATER_RATIO as f64) as usize;
        Self::new(capacity, low_water, on_evicted)
    }

    /// Insert or replace a value and mark it most recently used
    ///
    /// A replaced value goes to the eviction hook. If the cache is then over
    /// capacity, least recently used entries are evicted until the used size
    /// is at or under the low-water mark. The entry just put is evicted last,
    /// so it only leaves when it alone is larger than the low-water mark.
    pub fn put(&mut self, key: K, value: V, size: usize) {
        if size > self.capacity {
            log::warn!(
                "Refusing to cache {:?}: {} bytes exceeds capacity {}",
                key,
                size,
                self.capacity
            );
            self.stats.rejected += 1;
            (self.on_evicted)(&key, value);
            return;
        }

        if let Some(old) = self.entries.shift_remove(&key) {
            self.used -= old.size;
            (self.on_evicted)(&key, old.value);
        }

        self.entries.insert(key, CacheEntry { value, size, age: self.age });
        self.used += size;

        if self.used > self.capacity {
            self.evict_to(self.low_water);
        }
    }

    /// Get a value and promote it to most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let Some(index) = self.entries.get_index_of(key) else {
            self.stats.misses += 1;
            return None;
        };
        self.stats.hits += 1;

        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);

        let age = self.age;
        self.entries.get_index_mut(last).map(|(_, entry)| {
            entry.age = age;
            &entry.value
        })
    }

    /// Look at a value without touching recency, age or stats
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Check if the cache holds a key
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove one entry, passing its value to the eviction hook
    ///
    /// # Returns
    /// True if the key was cached
    pub fn remove(&mut self, key: &K) -> bool {
        match self.entries.shift_remove_entry(key) {
            Some((key, entry)) => {
                self.used -= entry.size;
                (self.on_evicted)(&key, entry.value);
                true
            }
            None => false,
        }
    }

    /// Advance the global age counter, usually once per evaluated frame
    ///
    /// # Returns
    /// The new age
    pub fn advance_age(&mut self) -> u64 {
        self.age += 1;
        self.age
    }

    /// Current global age
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Evict every entry last touched before `threshold`
    ///
    /// Runs regardless of capacity pressure; used to reclaim resources that
    /// have not been seen for many frames.
    ///
    /// # Returns
    /// Number of entries evicted
    pub fn trim_to_age(&mut self, threshold: u64) -> usize {
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.age < threshold)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            if let Some(entry) = self.entries.shift_remove(key) {
                self.used -= entry.size;
                self.stats.evictions += 1;
                log::trace!("Trimmed {:?} (age {} < {})", key, entry.age, threshold);
                (self.on_evicted)(key, entry.value);
            }
        }

        stale.len()
    }

    /// Evict everything and reset the used size and age counter
    pub fn clear(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        for (key, entry) in entries {
            (self.on_evicted)(&key, entry.value);
        }
        self.used = 0;
        self.age = 0;
    }

    /// Change the budget, evicting down to the new low-water mark if needed
    pub fn set_capacity(&mut self, capacity: usize, low_water: usize) {
        self.capacity = capacity;
        self.low_water = low_water.min(capacity);
        if self.used > self.capacity {
            self.evict_to(self.low_water);
        }
        // A single remaining entry may still be larger than a shrunk budget
        if self.used > self.capacity {
            self.evict_to(0);
        }
    }

    /// Aggregate size of cached values in bytes
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn low_water(&self) -> usize {
        self.low_water
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Evict from the least recently used end until `used <= target`
    fn evict_to(&mut self, target: usize) {
        while self.used > target {
            let Some((key, entry)) = self.entries.shift_remove_index(0) else {
                break;
            };
            self.used -= entry.size;
            self.stats.evictions += 1;
            log::trace!("Evicted {:?} ({} bytes), used {}", key, entry.size, self.used);
            (self.on_evicted)(&key, entry.value);
        }
    }
}
