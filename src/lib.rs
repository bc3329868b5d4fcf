//! Tessera - resource lifecycle core for a tiled globe renderer
//!
//! - [`cache`]: byte-budgeted LRU caching with deferred GPU release
//! - [`retrieval`]: bounded, single-flight loading of cache misses
//! - [`frame`]: pooled frames handed from evaluation to drawing
//! - [`pick`]: color-coded object picking
//! - [`render`]: the draw-side loop tying the above together

pub mod core;
pub mod cache;
pub mod retrieval;
pub mod frame;
pub mod pick;
pub mod render;
