//! Budgeted memory pools
//!
//! A pool is a byte budget standing in for one physical memory region.
//! Every allocation carries a lease on its pool; dropping the buffer drops
//! the lease, which hands the bytes back. Release therefore happens exactly
//! once per allocation, and never while the buffer is still reachable.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Which backing region a pool models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Limited, fast internal RAM
    Fast,
    /// Larger, slower external RAM
    Large,
}

/// A byte budget with allocation accounting
#[derive(Debug)]
pub struct MemoryPool {
    kind: PoolKind,
    capacity: usize,
    used: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicU64,
    releases: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of a pool's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub kind: PoolKind,
    pub capacity: usize,
    pub used: usize,
    /// Highest `used` seen since the pool was created
    pub peak: usize,
    pub allocations: u64,
    pub releases: u64,
    pub failures: u64,
}

impl PoolStats {
    /// Allocations not yet released
    pub fn live(&self) -> u64 {
        self.allocations - self.releases
    }

    /// Bytes still available
    pub fn available(&self) -> usize {
        self.capacity - self.used
    }
}

impl MemoryPool {
    /// Create a pool with the given capacity in bytes
    pub fn new(kind: PoolKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            used: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Pool kind
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently available
    pub fn available(&self) -> usize {
        self.capacity - self.used.load(Ordering::Acquire)
    }

    /// Snapshot the pool counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            kind: self.kind,
            capacity: self.capacity,
            used: self.used.load(Ordering::Acquire),
            peak: self.peak.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Try to allocate a buffer of `size` bytes from this pool.
    pub(crate) fn try_alloc(self: &Arc<Self>, size: usize) -> Option<PoolBuffer> {
        let lease = match self.try_reserve(size) {
            Some(lease) => lease,
            None => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let mut data = Vec::new();
        if data.try_reserve_exact(size).is_err() {
            // The host allocator refused even though the budget allowed it;
            // dropping the lease hands the reservation back.
            self.failures.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        Some(PoolBuffer { data, lease })
    }

    fn try_reserve(self: &Arc<Self>, size: usize) -> Option<Lease> {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let new = cur.checked_add(size)?;
            if new > self.capacity {
                return None;
            }
            if self
                .used
                .compare_exchange(cur, new, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                self.peak.fetch_max(new, Ordering::Relaxed);
                return Some(Lease {
                    pool: Arc::clone(self),
                    size,
                });
            }
        }
    }

    fn release(&self, size: usize) {
        self.used.fetch_sub(size, Ordering::AcqRel);
        self.releases.fetch_add(1, Ordering::Relaxed);
    }
}

/// Reservation of `size` bytes, returned to the pool on drop
#[derive(Debug)]
struct Lease {
    pool: Arc<MemoryPool>,
    size: usize,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.pool.release(self.size);
    }
}

/// Owned storage carved out of a [`MemoryPool`]
///
/// The buffer's capacity is fixed at allocation; its length is however many
/// bytes were last copied in.
#[derive(Debug)]
pub struct PoolBuffer {
    data: Vec<u8>,
    lease: Lease,
}

impl PoolBuffer {
    /// Reserved capacity in bytes
    pub fn capacity(&self) -> usize {
        self.lease.size
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Valid bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Pool this buffer was carved from
    pub fn pool_kind(&self) -> PoolKind {
        self.lease.pool.kind()
    }

    /// Replace the contents with `src`.
    ///
    /// Returns `false` and leaves the buffer untouched if `src` does not fit.
    pub fn copy_from(&mut self, src: &[u8]) -> bool {
        if src.len() > self.capacity() {
            return false;
        }
        self.data.clear();
        self.data.extend_from_slice(src);
        true
    }
}
