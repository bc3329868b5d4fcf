//! Retrieval coordinator: fills cache misses without blocking the frame
//!
//! `retrieve` is called every frame for every visible resource. The first
//! call for a missing key starts a fetch and returns nothing; a later frame
//! finds the resource in the cache, or finds the key marked absent. Fetches
//! are single-flight per (key, request class) and bounded per class.
//!
//! Completed fetches are sent back over a channel and applied on the
//! evaluation side in [`RetrievalCoordinator::process_completed`], so the
//! cache and absence tracker are never touched from fetch tasks.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::absence::AbsenceTracker;
use super::fetch::{FetchError, FetchTarget, Fetcher};
use super::key_hash;
use super::redraw::RequestRedraw;
use super::source::{RequestClass, ResourceSource};
use crate::cache::{GpuResource, ResourceCache};
use crate::core::config::{EngineConfig, RetrievalConfig};

/// A fetch that finished, successfully or not
struct Completion<K, R> {
    key: K,
    class: RequestClass,
    result: Result<R, FetchError>,
    elapsed: Duration,
}

/// Reports a fetch task's outcome exactly once
///
/// Dropped without [`CompletionGuard::complete`] (the fetch panicked or the
/// runtime dropped the task) it reports [`FetchError::Aborted`], so the
/// ticket is still released and the key backs off like any transient
/// failure.
struct CompletionGuard<K, R> {
    key: Option<K>,
    class: RequestClass,
    started: Instant,
    completed_tx: mpsc::UnboundedSender<Completion<K, R>>,
    redraw: Arc<dyn RequestRedraw>,
}

impl<K, R> CompletionGuard<K, R> {
    fn complete(mut self, result: Result<R, FetchError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<R, FetchError>) {
        let Some(key) = self.key.take() else {
            return;
        };
        let completion = Completion { key, class: self.class, result, elapsed: self.started.elapsed() };
        // The coordinator may be gone during shutdown
        if self.completed_tx.send(completion).is_ok() {
            self.redraw.request_redraw();
        }
    }
}

impl<K, R> Drop for CompletionGuard<K, R> {
    fn drop(&mut self) {
        if self.key.is_some() {
            self.send(Err(FetchError::Aborted("fetch task ended without a result".into())));
        }
    }
}

/// Counters for one coordinator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetrievalStats {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Requests turned away because the class was at its bound
    pub deferred: u64,
}

/// Bounded, single-flight fetch-and-insert pipeline feeding a resource cache
pub struct RetrievalCoordinator<K, R: GpuResource> {
    cache: ResourceCache<K, R>,
    absence: AbsenceTracker,
    /// In-flight markers, at most one per (key, class)
    tickets: HashSet<(K, RequestClass)>,
    in_flight: HashMap<RequestClass, usize>,
    limits: RetrievalConfig,
    /// Frames an entry may go unseen before it is trimmed; 0 disables
    trim_after_frames: u64,
    fetcher: Arc<dyn Fetcher<R>>,
    redraw: Arc<dyn RequestRedraw>,
    runtime: Handle,
    completed_tx: mpsc::UnboundedSender<Completion<K, R>>,
    completed_rx: mpsc::UnboundedReceiver<Completion<K, R>>,
    stats: RetrievalStats,
}

impl<K, R> RetrievalCoordinator<K, R>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + 'static,
    R: GpuResource + Clone,
{
    /// Create a coordinator that owns `cache`
    ///
    /// # Arguments
    /// * `cache` - Cache the fetched resources go into
    /// * `absence` - Failure suppression; its cooldown applies to transient failures
    /// * `limits` - Per-class in-flight bounds
    /// * `fetcher` - Loads local and remote targets
    /// * `redraw` - Notified when a fetch completes
    /// * `runtime` - Runtime the fetches are spawned on
    pub fn new(
        cache: ResourceCache<K, R>,
        absence: AbsenceTracker,
        limits: RetrievalConfig,
        fetcher: Arc<dyn Fetcher<R>>,
        redraw: Arc<dyn RequestRedraw>,
        runtime: Handle,
    ) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            cache,
            absence,
            tickets: HashSet::new(),
            in_flight: HashMap::new(),
            limits,
            trim_after_frames: 0,
            fetcher,
            redraw,
            runtime,
            completed_tx,
            completed_rx,
            stats: RetrievalStats::default(),
        }
    }

    /// Create a coordinator and its cache from an [`EngineConfig`]
    pub fn from_config(
        label: &'static str,
        config: &EngineConfig,
        fetcher: Arc<dyn Fetcher<R>>,
        redraw: Arc<dyn RequestRedraw>,
        runtime: Handle,
    ) -> Self {
        let cache = ResourceCache::from_config(label, &config.cache);
        let absence = AbsenceTracker::new(config.absence.cooldown());
        let mut coordinator =
            Self::new(cache, absence, config.retrieval.clone(), fetcher, redraw, runtime);
        coordinator.trim_after_frames = config.cache.trim_after_frames;
        for class in RequestClass::ALL {
            log::info!("{} {} retrieval: {} in flight", label, class, coordinator.limit(class));
        }
        coordinator
    }

    /// Trim entries unseen for `frames` frames in [`Self::advance_frame`]
    pub fn set_trim_after_frames(&mut self, frames: u64) {
        self.trim_after_frames = frames;
    }

    /// Get a resource, starting a fetch if it isn't cached
    ///
    /// Never blocks. Returns the resource when it is cached or can be built
    /// in memory; returns `None` while a fetch is pending, while the class
    /// is at its in-flight bound, or while the key is marked absent.
    pub fn retrieve(&mut self, key: &K, source: ResourceSource<R>) -> Option<R> {
        self.process_completed();

        if let Some(resource) = self.cache.get(key) {
            return Some(resource.clone());
        }

        if let ResourceSource::Resident(resource) = source {
            self.insert(key.clone(), resource.clone());
            return Some(resource);
        }

        let hash = key_hash(key);
        if self.absence.is_absent(hash) {
            return None;
        }

        if let Some(class) = source.class() {
            if self.tickets.contains(&(key.clone(), class)) {
                return None;
            }
        }

        match source {
            ResourceSource::Resident(_) => None,
            ResourceSource::Factory(build) => match build() {
                Ok(resource) => {
                    self.insert(key.clone(), resource.clone());
                    Some(resource)
                }
                Err(e) => {
                    log::warn!("Failed to build {:?}: {}", key, e);
                    self.absence.mark_absent(hash, true);
                    None
                }
            },
            ResourceSource::Local(path) => {
                self.start_fetch(key, FetchTarget::Local(path));
                None
            }
            ResourceSource::Remote(url) => {
                self.start_fetch(key, FetchTarget::Remote(url));
                None
            }
            ResourceSource::Unrecognized(what) => {
                log::warn!("Unrecognized source for {:?}: {}", key, what);
                self.absence.mark_absent(hash, true);
                None
            }
        }
    }

    /// Apply every fetch that completed since the last call
    ///
    /// The ticket is removed before the cache or absence tracker changes.
    ///
    /// # Returns
    /// Number of completions applied
    pub fn process_completed(&mut self) -> usize {
        let mut applied = 0;

        while let Ok(completion) = self.completed_rx.try_recv() {
            let Completion { key, class, result, elapsed } = completion;

            if self.tickets.remove(&(key.clone(), class)) {
                if let Some(count) = self.in_flight.get_mut(&class) {
                    *count = count.saturating_sub(1);
                }
            }

            let hash = key_hash(&key);
            match result {
                Ok(resource) => {
                    log::debug!(
                        "Retrieved {:?} ({}, {} bytes) in {:.1}ms",
                        key,
                        class,
                        resource.size_in_bytes(),
                        elapsed.as_secs_f32() * 1000.0
                    );
                    self.stats.succeeded += 1;
                    self.absence.unmark_absent(hash);
                    if self.cache.contains(&key) {
                        // A resident or factory value landed while the fetch ran
                        log::debug!("Keeping newer cached {:?}, releasing fetched copy", key);
                        self.cache.release_queue().enqueue(resource);
                    } else {
                        self.cache.put(key, resource);
                    }
                }
                Err(e) => {
                    let permanent = e.is_permanent_for(class);
                    log::warn!(
                        "Failed to retrieve {:?} ({}): {}{}",
                        key,
                        class,
                        e,
                        if permanent { ", not retrying" } else { "" }
                    );
                    self.stats.failed += 1;
                    self.absence.mark_absent(hash, permanent);
                }
            }
            applied += 1;
        }

        applied
    }

    /// Per-frame bookkeeping: apply completions, drop expired absences, age
    /// the cache and trim stale entries
    ///
    /// # Returns
    /// Number of trimmed entries
    pub fn advance_frame(&mut self) -> usize {
        self.process_completed();
        let purged = self.absence.purge_expired(Instant::now());
        if purged > 0 {
            log::trace!("Dropped {} expired absence records", purged);
        }
        let trimmed = self.cache.begin_frame(self.trim_after_frames);
        if trimmed > 0 {
            log::debug!("Trimmed {} stale resources", trimmed);
        }
        trimmed
    }

    /// Evict every cached resource and forget every absence
    ///
    /// In-flight fetches keep their tickets; their results still arrive.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.absence.clear();
    }

    /// Number of fetches in flight for a class
    pub fn in_flight(&self, class: RequestClass) -> usize {
        self.in_flight.get(&class).copied().unwrap_or(0)
    }

    /// Total fetches in flight
    pub fn in_flight_total(&self) -> usize {
        self.in_flight.values().sum()
    }

    /// Whether a fetch for `(key, class)` is in flight
    pub fn has_ticket(&self, key: &K, class: RequestClass) -> bool {
        self.tickets.contains(&(key.clone(), class))
    }

    /// Number of in-flight tickets
    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    /// Whether `key` is currently suppressed
    pub fn is_absent(&mut self, key: &K) -> bool {
        self.absence.is_absent(key_hash(key))
    }

    pub fn cache(&self) -> &ResourceCache<K, R> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResourceCache<K, R> {
        &mut self.cache
    }

    pub fn absence(&self) -> &AbsenceTracker {
        &self.absence
    }

    pub fn absence_mut(&mut self) -> &mut AbsenceTracker {
        &mut self.absence
    }

    pub fn stats(&self) -> RetrievalStats {
        self.stats
    }

    fn limit(&self, class: RequestClass) -> usize {
        match class {
            RequestClass::Local => self.limits.max_local_in_flight,
            RequestClass::Remote => self.limits.max_remote_in_flight,
        }
    }

    fn insert(&mut self, key: K, resource: R) {
        self.absence.unmark_absent(key_hash(&key));
        self.cache.put(key, resource);
    }

    /// Register a ticket and spawn the fetch, unless one is already in
    /// flight or the class is at its bound
    fn start_fetch(&mut self, key: &K, target: FetchTarget) {
        let class = target.class();
        let ticket = (key.clone(), class);
        if self.tickets.contains(&ticket) {
            return;
        }

        if self.in_flight(class) >= self.limit(class) {
            log::trace!("{} retrieval at bound, deferring {:?}", class, key);
            self.stats.deferred += 1;
            return;
        }

        self.tickets.insert(ticket);
        *self.in_flight.entry(class).or_insert(0) += 1;
        self.stats.started += 1;
        log::debug!("Fetching {:?} from {:?}", key, target);

        let fetch = self.fetcher.fetch(target);
        let guard = CompletionGuard {
            key: Some(key.clone()),
            class,
            started: Instant::now(),
            completed_tx: self.completed_tx.clone(),
            redraw: Arc::clone(&self.redraw),
        };

        self.runtime.spawn(async move {
            let result = fetch.await;
            guard.complete(result);
        });
    }
}
