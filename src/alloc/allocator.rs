//! Dual-pool allocator
//!
//! Requests go to the fast pool unless they would eat most of what is left
//! there, in which case the large pool is tried first. Either pool can be
//! forced with a placement hint.

use std::sync::Arc;

use super::config::{FailurePolicy, MemoryConfig};
use super::pool::{MemoryPool, PoolBuffer, PoolKind, PoolStats};
use crate::error::{Error, Result};

/// Where an allocation may be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Fast pool only
    FastOnly,
    /// Either pool, chosen by size
    Any,
    /// Large pool only
    LargeOnly,
}

/// Counters for both pools
#[derive(Debug, Clone, Copy)]
pub struct AllocatorStats {
    pub fast: PoolStats,
    pub large: Option<PoolStats>,
}

/// Size- and policy-aware allocator over a fast and an optional large pool
#[derive(Debug)]
pub struct Allocator {
    fast: Arc<MemoryPool>,
    large: Option<Arc<MemoryPool>>,
    large_first_num: usize,
    large_first_den: usize,
}

impl Allocator {
    /// Create an allocator from configuration
    pub fn new(config: &MemoryConfig) -> Self {
        let large = (config.large_pool_bytes > 0)
            .then(|| Arc::new(MemoryPool::new(PoolKind::Large, config.large_pool_bytes)));

        Self {
            fast: Arc::new(MemoryPool::new(PoolKind::Fast, config.fast_pool_bytes)),
            large,
            large_first_num: config.large_first_num,
            large_first_den: config.large_first_den.max(1),
        }
    }

    /// Acquire a buffer of `size` bytes.
    ///
    /// `old` is released before anything else happens; its contents are not
    /// carried over. Under [`FailurePolicy::BestEffort`] a request that no
    /// pool can satisfy returns `Ok(None)`; under
    /// [`FailurePolicy::FailFast`] it returns [`Error::OutOfMemory`], which
    /// callers treat as device-fatal.
    pub fn acquire(
        &self,
        old: Option<PoolBuffer>,
        size: usize,
        policy: FailurePolicy,
        placement: Placement,
    ) -> Result<Option<PoolBuffer>> {
        drop(old);

        let buf = match placement {
            Placement::FastOnly => self.fast.try_alloc(size),
            Placement::LargeOnly => self.try_large(size),
            Placement::Any if self.prefers_large(size) => {
                self.try_large(size).or_else(|| self.fast.try_alloc(size))
            }
            Placement::Any => self.fast.try_alloc(size).or_else(|| self.try_large(size)),
        };

        match (buf, policy) {
            (Some(buf), _) => Ok(Some(buf)),
            (None, FailurePolicy::BestEffort) => {
                tracing::debug!(
                    size = size,
                    placement = ?placement,
                    fast_available = self.fast.available(),
                    "Allocation failed, degrading"
                );
                Ok(None)
            }
            (None, FailurePolicy::FailFast) => {
                tracing::error!(
                    size = size,
                    placement = ?placement,
                    fast_available = self.fast.available(),
                    large_available = self.large.as_ref().map(|p| p.available()),
                    "Out of memory"
                );
                Err(Error::OutOfMemory { size, placement })
            }
        }
    }

    /// Whether a request of `size` bytes should try the large pool first
    pub fn prefers_large(&self, size: usize) -> bool {
        let available = self.fast.available() as u128;
        (size as u128) * (self.large_first_den as u128)
            > available * (self.large_first_num as u128)
    }

    fn try_large(&self, size: usize) -> Option<PoolBuffer> {
        self.large.as_ref().and_then(|pool| pool.try_alloc(size))
    }

    /// The fast pool
    pub fn fast_pool(&self) -> &MemoryPool {
        &self.fast
    }

    /// The large pool, if fitted
    pub fn large_pool(&self) -> Option<&MemoryPool> {
        self.large.as_deref()
    }

    /// Snapshot both pools
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            fast: self.fast.stats(),
            large: self.large.as_ref().map(|p| p.stats()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(fast: usize, large: usize) -> Allocator {
        Allocator::new(
            &MemoryConfig::default()
                .fast_pool_bytes(fast)
                .large_pool_bytes(large),
        )
    }

    #[test]
    fn test_small_request_uses_fast_pool() {
        let alloc = allocator(300, 1000);

        let buf = alloc
            .acquire(None, 200, FailurePolicy::FailFast, Placement::Any)
            .unwrap()
            .unwrap();
        assert_eq!(buf.pool_kind(), PoolKind::Fast);
    }

    #[test]
    fn test_large_request_tries_large_pool_first() {
        let alloc = allocator(300, 1000);

        // 201 > 2/3 * 300, so the large pool goes first even though the
        // fast pool could fit it.
        assert!(alloc.prefers_large(201));
        let buf = alloc
            .acquire(None, 201, FailurePolicy::FailFast, Placement::Any)
            .unwrap()
            .unwrap();
        assert_eq!(buf.pool_kind(), PoolKind::Large);
        assert_eq!(alloc.stats().fast.allocations, 0);
    }

    #[test]
    fn test_threshold_tracks_available_space() {
        let alloc = allocator(300, 1000);
        assert!(!alloc.prefers_large(150));

        let _held = alloc
            .acquire(None, 150, FailurePolicy::FailFast, Placement::FastOnly)
            .unwrap();
        // Only 150 left: 150 > 100.
        assert!(alloc.prefers_large(150));
    }

    #[test]
    fn test_falls_back_to_fast_when_large_is_full() {
        let alloc = allocator(300, 100);

        let buf = alloc
            .acquire(None, 250, FailurePolicy::FailFast, Placement::Any)
            .unwrap()
            .unwrap();
        assert_eq!(buf.pool_kind(), PoolKind::Fast);
    }

    #[test]
    fn test_falls_back_to_large_when_fast_fails() {
        // With a threshold above 1, requests slightly larger than what is
        // left in the fast pool are still tried there first.
        let alloc = Allocator::new(
            &MemoryConfig::default()
                .fast_pool_bytes(100)
                .large_pool_bytes(1000)
                .large_first_threshold(2, 1),
        );
        assert!(!alloc.prefers_large(150));

        let buf = alloc
            .acquire(None, 150, FailurePolicy::FailFast, Placement::Any)
            .unwrap()
            .unwrap();
        assert_eq!(buf.pool_kind(), PoolKind::Large);

        let stats = alloc.stats();
        assert_eq!(stats.fast.failures, 1);
        assert_eq!(stats.fast.allocations, 0);
    }

    #[test]
    fn test_large_only_never_touches_fast() {
        let alloc = allocator(1000, 10);

        let result = alloc
            .acquire(None, 20, FailurePolicy::BestEffort, Placement::LargeOnly)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(alloc.stats().fast.allocations, 0);
    }

    #[test]
    fn test_large_only_without_large_pool() {
        let alloc = allocator(1000, 0);
        assert!(alloc.large_pool().is_none());

        let result = alloc.acquire(None, 1, FailurePolicy::FailFast, Placement::LargeOnly);
        assert!(matches!(
            result,
            Err(Error::OutOfMemory {
                size: 1,
                placement: Placement::LargeOnly
            })
        ));
    }

    #[test]
    fn test_best_effort_failure_has_no_side_effects() {
        let alloc = allocator(100, 100);
        let before = alloc.stats();

        let result = alloc
            .acquire(None, 500, FailurePolicy::BestEffort, Placement::Any)
            .unwrap();
        assert!(result.is_none());

        let after = alloc.stats();
        assert_eq!(after.fast.used, before.fast.used);
        assert_eq!(after.fast.live(), 0);
        assert_eq!(after.large.unwrap().used, 0);
        assert_eq!(after.large.unwrap().live(), 0);
    }

    #[test]
    fn test_fail_fast_reports_out_of_memory() {
        let alloc = allocator(100, 100);

        let err = alloc
            .acquire(None, 500, FailurePolicy::FailFast, Placement::Any)
            .unwrap_err();
        assert!(err.is_device_fatal());
    }

    #[test]
    fn test_old_buffer_released_first() {
        let alloc = allocator(100, 0);

        let old = alloc
            .acquire(None, 80, FailurePolicy::FailFast, Placement::FastOnly)
            .unwrap();
        // Would not fit next to the old buffer.
        let new = alloc
            .acquire(old, 90, FailurePolicy::FailFast, Placement::FastOnly)
            .unwrap()
            .unwrap();

        assert_eq!(new.capacity(), 90);
        let stats = alloc.stats().fast;
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.used, 90);
    }
}
