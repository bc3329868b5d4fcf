//! Fire-and-forget redraw requests

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Signals the render loop that cache or absence state changed
///
/// Called from fetch tasks, so implementations must be cheap and thread-safe.
pub trait RequestRedraw: Send + Sync {
    fn request_redraw(&self);
}

/// Redraw flag polled by a render loop without its own wakeup mechanism
#[derive(Debug, Default)]
pub struct RedrawFlag {
    pending: AtomicBool,
    requests: AtomicU64,
}

impl RedrawFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the flag, returning whether a redraw was requested
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Check the flag without clearing it
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Total requests since creation
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl RequestRedraw for RedrawFlag {
    fn request_redraw(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }
}

/// Redraws go to a closure, e.g. a window event-loop proxy
pub struct RedrawFn<F>(pub F);

impl<F: Fn() + Send + Sync> RequestRedraw for RedrawFn<F> {
    fn request_redraw(&self) {
        (self.0)()
    }
}
