//! Byte-budgeted resource caching with deferred release
//!
//! - [`CapacityCache`]: generic LRU store with a size budget and age trimming
//! - [`ReleaseQueue`]: evicted resources waiting for the drawing context
//! - [`ResourceCache`]: the two wired together for GPU resources

pub mod capacity;
pub mod release;
pub mod resource;

pub use capacity::{CacheStats, CapacityCache, EvictionHook, DEFAULT_LOW_WATER_RATIO};
pub use release::{GpuResource, ReleaseDrain, ReleaseQueue, ReleaseReport};
pub use resource::ResourceCache;
