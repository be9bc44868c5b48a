use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::area::CacheArea;

/// Platform cache-maintenance primitives.
pub trait CacheOps: Send + Sync {
    /// Write CPU-cached dirty lines covering `area` back to memory.
    fn clean(&self, area: &CacheArea);
    /// Drop CPU-cached lines covering `area` so the next CPU read comes from memory.
    fn invalidate(&self, area: &CacheArea);
}

/// Cache operations for memory that is already coherent (no-ops).
#[derive(Clone, Copy, Debug, Default)]
pub struct CoherentMemory;

impl CacheOps for CoherentMemory {
    fn clean(&self, _area: &CacheArea) {}
    fn invalidate(&self, _area: &CacheArea) {}
}

/// Counters for issued cache maintenance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoherencyStats {
    /// Clean operations issued.
    pub cleans: u64,
    /// Invalidate operations issued.
    pub invalidates: u64,
    /// Bytes covered by clean operations.
    pub cleaned_bytes: u64,
    /// Bytes covered by invalidate operations.
    pub invalidated_bytes: u64,
}

#[derive(Default)]
struct Counters {
    cleans: AtomicU64,
    invalidates: AtomicU64,
    cleaned_bytes: AtomicU64,
    invalidated_bytes: AtomicU64,
}

/// Issues bounded clean/invalidate operations around hardware memory access.
///
/// Tracks regions written by hardware since the last CPU synchronization. A CPU read that
/// overlaps one of them invalidates that region first. Shared by every unit that touches
/// memory behind the CPU cache.
pub struct CoherencyManager {
    ops: Arc<dyn CacheOps>,
    pending: Mutex<Vec<CacheArea>>,
    counters: Counters,
}

impl std::fmt::Debug for CoherencyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoherencyManager")
            .field("pending", &self.pending().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for CoherencyManager {
    fn default() -> Self {
        Self::new(Arc::new(CoherentMemory))
    }
}

impl CoherencyManager {
    /// Create a manager over the given platform primitives.
    pub fn new(ops: Arc<dyn CacheOps>) -> Self {
        Self {
            ops,
            pending: Mutex::new(Vec::new()),
            counters: Counters::default(),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Vec<CacheArea>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clean(&self, area: &CacheArea) {
        tracing::trace!(
            first_byte = area.first_byte,
            width_bytes = area.width_bytes,
            height = area.height,
            stride = area.stride,
            "cache clean"
        );
        self.ops.clean(area);
        self.counters.cleans.fetch_add(1, Ordering::Relaxed);
        self.counters
            .cleaned_bytes
            .fetch_add(area.byte_count() as u64, Ordering::Relaxed);
    }

    fn invalidate(&self, area: &CacheArea) {
        tracing::trace!(
            first_byte = area.first_byte,
            width_bytes = area.width_bytes,
            height = area.height,
            stride = area.stride,
            "cache invalidate"
        );
        self.ops.invalidate(area);
        self.counters.invalidates.fetch_add(1, Ordering::Relaxed);
        self.counters
            .invalidated_bytes
            .fetch_add(area.byte_count() as u64, Ordering::Relaxed);
    }

    /// Make CPU writes to `area` visible to hardware that is about to read it.
    pub fn clean_for_hw_read(&self, area: &CacheArea) {
        if area.is_empty() {
            return;
        }
        self.clean(area);
    }

    /// Record `area` as about to be written by hardware.
    pub fn begin_hw_write(&self, area: &CacheArea) {
        if area.is_empty() {
            return;
        }
        self.pending().push(*area);
    }

    /// Prepare `area` for CPU access, invalidating every pending hardware write it overlaps.
    ///
    /// Returns the number of invalidated regions.
    pub fn prepare_cpu_access(&self, area: &CacheArea) -> usize {
        let stale: Vec<CacheArea> = {
            let mut pending = self.pending();
            let (hit, keep): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|w| w.overlaps(area));
            *pending = keep;
            hit
        };
        for w in &stale {
            self.invalidate(w);
        }
        stale.len()
    }

    /// Invalidate every pending hardware write.
    pub fn sync_all(&self) -> usize {
        let stale = std::mem::take(&mut *self.pending());
        for w in &stale {
            self.invalidate(w);
        }
        stale.len()
    }

    /// Regions written by hardware and not yet synchronized.
    pub fn pending_writes(&self) -> Vec<CacheArea> {
        self.pending().clone()
    }

    /// Snapshot of the maintenance counters.
    pub fn stats(&self) -> CoherencyStats {
        CoherencyStats {
            cleans: self.counters.cleans.load(Ordering::Relaxed),
            invalidates: self.counters.invalidates.load(Ordering::Relaxed),
            cleaned_bytes: self.counters.cleaned_bytes.load(Ordering::Relaxed),
            invalidated_bytes: self.counters.invalidated_bytes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/coherency.rs"]
mod tests;
