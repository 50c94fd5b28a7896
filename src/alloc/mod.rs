//! Size- and policy-aware memory allocation
//!
//! Devices like this one have a small amount of fast internal RAM and,
//! optionally, a larger but slower external RAM. Frame buffers are big
//! compared to the fast region, so where they land matters:
//!
//! ```text
//!   acquire(old, size, policy, placement)
//!        │
//!        ├─ release old
//!        ├─ LargeOnly ─────────────► large
//!        ├─ FastOnly ──────────────► fast
//!        └─ Any ─┬─ size > 2/3 fast.available ─► large, then fast
//!                └─ otherwise ──────────────────► fast, then large
//!
//!   nothing fits: FailFast → Error::OutOfMemory (device restart)
//!                 BestEffort → None
//! ```

pub mod allocator;
pub mod config;
pub mod pool;

pub use allocator::{Allocator, AllocatorStats, Placement};
pub use config::{FailurePolicy, MemoryConfig};
pub use pool::{MemoryPool, PoolBuffer, PoolKind, PoolStats};
