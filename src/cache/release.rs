//! Deferred release of evicted resources
//!
//! Destroying a GPU resource is only safe on the thread that owns the device
//! context. Eviction happens wherever the cache is used, so evicted resources
//! are parked here and the draw loop releases them once per frame.

use std::sync::{Mutex, MutexGuard};

use crate::core::error::Error;

/// A resource that must be explicitly released on the drawing context
pub trait GpuResource: Send + 'static {
    /// Destroy the underlying resource
    fn release(self) -> Result<(), Error>;

    /// Memory held by the resource, used as its cache size
    fn size_in_bytes(&self) -> usize;
}

impl GpuResource for wgpu::Texture {
    fn release(self) -> Result<(), Error> {
        self.destroy();
        Ok(())
    }

    fn size_in_bytes(&self) -> usize {
        let size = self.size();
        let block_size = self.format().block_copy_size(None).unwrap_or(4) as usize;
        size.width as usize * size.height as usize * size.depth_or_array_layers as usize * block_size
    }
}

impl GpuResource for wgpu::Buffer {
    fn release(self) -> Result<(), Error> {
        self.destroy();
        Ok(())
    }

    fn size_in_bytes(&self) -> usize {
        self.size() as usize
    }
}

/// Decoded CPU-side images (text bitmaps, imagery waiting for upload)
impl GpuResource for image::RgbaImage {
    fn release(self) -> Result<(), Error> {
        Ok(())
    }

    fn size_in_bytes(&self) -> usize {
        self.as_raw().len()
    }
}

/// Result of one release pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: usize,
    pub failed: usize,
}

impl ReleaseReport {
    pub fn merge(&mut self, other: ReleaseReport) {
        self.released += other.released;
        self.failed += other.failed;
    }
}

/// Something the draw loop drains once per frame
///
/// Object-safe so one loop can drain queues of different resource types.
pub trait ReleaseDrain: Send + Sync {
    /// Release every queued resource
    fn release_pending(&self) -> ReleaseReport;

    /// Number of resources waiting for release
    fn pending(&self) -> usize;
}

/// Thread-safe queue of resources waiting to be released
pub struct ReleaseQueue<R> {
    label: &'static str,
    queue: Mutex<Vec<R>>,
}

impl<R: GpuResource> ReleaseQueue<R> {
    /// Create an empty queue; `label` shows up in release failure logs
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Park a resource until the next release pass
    pub fn enqueue(&self, resource: R) {
        self.lock().push(resource);
    }

    /// Release everything queued so far
    ///
    /// A failing resource is logged and counted; the rest are still released.
    pub fn release_all(&self) -> ReleaseReport {
        // Take the batch first so eviction on another thread never waits on
        // resource destruction.
        let batch = std::mem::take(&mut *self.lock());

        let mut report = ReleaseReport::default();
        for resource in batch {
            match resource.release() {
                Ok(()) => report.released += 1,
                Err(e) => {
                    log::warn!("Failed to release {} resource: {}", self.label, e);
                    report.failed += 1;
                }
            }
        }

        if report.released + report.failed > 0 {
            log::trace!(
                "Released {} {} resources ({} failed)",
                report.released,
                self.label,
                report.failed
            );
        }
        report
    }

    /// Number of resources waiting for release
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<R>> {
        // A panic while pushing leaves the Vec intact
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R: GpuResource> ReleaseDrain for ReleaseQueue<R> {
    fn release_pending(&self) -> ReleaseReport {
        self.release_all()
    }

    fn pending(&self) -> usize {
        self.len()
    }
}
