//! Asynchronous retrieval of cache misses
//!
//! - [`RetrievalCoordinator`]: bounded, single-flight fetch-and-insert
//! - [`AbsenceTracker`]: suppresses keys known to fail
//! - [`Fetcher`]: the fetch collaborator; [`ImageFileFetcher`] loads local imagery
//! - [`RequestRedraw`]: notified when a fetch completes

pub mod absence;
pub mod source;
pub mod fetch;
pub mod image_fetch;
pub mod redraw;
pub mod coordinator;

use std::hash::{Hash, Hasher};

pub use absence::{AbsenceTracker, DEFAULT_ABSENCE_COOLDOWN};
pub use source::{FactoryFn, RequestClass, ResourceSource};
pub use fetch::{FetchError, FetchFn, FetchFuture, FetchTarget, Fetcher};
pub use image_fetch::ImageFileFetcher;
pub use redraw::{RedrawFlag, RedrawFn, RequestRedraw};
pub use coordinator::{RetrievalCoordinator, RetrievalStats};

/// Stable 64-bit hash of a resource key, used for absence records
///
/// Stable for the lifetime of the process, which is as long as absence
/// records live.
pub fn key_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}
