//! Render resource cache: a capacity cache whose evictions are released on
//! the drawing context.

use std::hash::Hash;
use std::sync::Arc;

use super::capacity::{CacheStats, CapacityCache};
use super::release::{GpuResource, ReleaseQueue};
use crate::core::config::CacheConfig;

/// Shared handles release the resource when the cache held the last one.
/// Otherwise the remaining holders keep it alive and drop it themselves.
impl<T: GpuResource + Sync> GpuResource for Arc<T> {
    fn release(self) -> Result<(), crate::core::Error> {
        match Arc::try_unwrap(self) {
            Ok(inner) => inner.release(),
            Err(_) => Ok(()),
        }
    }

    fn size_in_bytes(&self) -> usize {
        self.as_ref().size_in_bytes()
    }
}

/// Byte-budgeted cache of GPU resources
///
/// Owned by whichever component draws from it (a tile layer, the text
/// renderer). Evicted resources go to the owned [`ReleaseQueue`], which the
/// draw loop drains once per frame.
pub struct ResourceCache<K, R: GpuResource> {
    entries: CapacityCache<K, R>,
    release: Arc<ReleaseQueue<R>>,
}

impl<K, R> ResourceCache<K, R>
where
    K: Clone + Eq + Hash + std::fmt::Debug + 'static,
    R: GpuResource,
{
    /// Create a cache
    ///
    /// # Arguments
    /// * `label` - Name used in logs, e.g. "imagery"
    /// * `capacity` - Byte budget
    /// * `low_water` - Size eviction drains down to
    pub fn new(label: &'static str, capacity: usize, low_water: usize) -> Self {
        let release = Arc::new(ReleaseQueue::new(label));
        let sink = Arc::clone(&release);
        let entries = CapacityCache::new(
            capacity,
            low_water,
            Box::new(move |_key: &K, resource: R| sink.enqueue(resource)),
        );
        log::info!(
            "Created {} resource cache: {}MB, low water {}MB",
            label,
            capacity / 1024 / 1024,
            low_water / 1024 / 1024
        );
        Self { entries, release }
    }

    /// Create a cache from the `cache` config section
    pub fn from_config(label: &'static str, config: &CacheConfig) -> Self {
        Self::new(label, config.capacity_bytes, config.low_water_bytes())
    }

    /// Insert a resource sized by [`GpuResource::size_in_bytes`]
    pub fn put(&mut self, key: K, resource: R) {
        let size = resource.size_in_bytes();
        self.entries.put(key, resource, size);
    }

    /// Insert a resource with an explicit size
    pub fn put_sized(&mut self, key: K, resource: R, size: usize) {
        self.entries.put(key, resource, size);
    }

    /// Get a resource, marking it most recently used
    pub fn get(&mut self, key: &K) -> Option<&R> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Advance the age counter and trim entries unseen for `max_age` frames
    ///
    /// A `max_age` of 0 only advances the age.
    ///
    /// # Returns
    /// Number of trimmed entries
    pub fn begin_frame(&mut self, max_age: u64) -> usize {
        let age = self.entries.advance_age();
        if max_age == 0 || age <= max_age {
            return 0;
        }
        self.entries.trim_to_age(age - max_age)
    }

    /// Evict every entry older than `threshold`
    pub fn trim_to_age(&mut self, threshold: u64) -> usize {
        self.entries.trim_to_age(threshold)
    }

    /// Evict everything; resources wait in the release queue
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The queue the draw loop drains
    pub fn release_queue(&self) -> Arc<ReleaseQueue<R>> {
        Arc::clone(&self.release)
    }

    /// The underlying capacity cache
    pub fn entries(&self) -> &CapacityCache<K, R> {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut CapacityCache<K, R> {
        &mut self.entries
    }

    pub fn used(&self) -> usize {
        self.entries.used()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::release::tests::CountingResource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resource(size: usize, released: &Arc<AtomicUsize>) -> CountingResource {
        CountingResource { size, fail: false, released: Arc::clone(released) }
    }

    #[test]
    fn test_eviction_defers_release() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut cache = ResourceCache::new("test", 100, 75);

        cache.put("a", resource(60, &released));
        cache.put("b", resource(60, &released));

        // "a" was evicted but not destroyed yet
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.release_queue().len(), 1);
        assert_eq!(released.load(Ordering::SeqCst), 0);

        let report = cache.release_queue().release_all();
        assert_eq!(report.released, 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_begin_frame_trims_stale() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut cache = ResourceCache::new("test", 1000, 750);

        cache.put("old", resource(10, &released));
        for _ in 0..3 {
            cache.begin_frame(5);
        }
        cache.put("fresh", resource(10, &released));

        let mut trimmed = 0;
        for _ in 0..3 {
            trimmed += cache.begin_frame(5);
        }

        // "old" stamped at age 0, "fresh" at 3; age now 6 trims below 1
        assert_eq!(trimmed, 1);
        assert!(!cache.contains(&"old"));
        assert!(cache.contains(&"fresh"));
        assert_eq!(cache.release_queue().len(), 1);
    }

    #[test]
    fn test_begin_frame_zero_disables_trim() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut cache = ResourceCache::new("test", 1000, 750);
        cache.put("a", resource(10, &released));
        for _ in 0..100 {
            assert_eq!(cache.begin_frame(0), 0);
        }
        assert!(cache.contains(&"a"));
    }

    #[test]
    fn test_shared_handle_release() {
        let released = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(resource(8, &released));
        let held = Arc::clone(&shared);

        assert_eq!(shared.size_in_bytes(), 8);
        shared.release().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 0);

        held.release().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig { capacity_bytes: 4096, low_water_ratio: 0.5, trim_after_frames: 0 };
        let cache: ResourceCache<u32, CountingResource> = ResourceCache::from_config("test", &config);
        assert_eq!(cache.entries().capacity(), 4096);
        assert_eq!(cache.entries().low_water(), 2048);
    }
}
