//! Memory configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;

/// What to do when no pool can satisfy a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Treat the failure as device-fatal and restart
    FailFast,
    /// Return no allocation and let the caller degrade
    BestEffort,
}

/// Memory configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size of the fast (internal RAM) pool in bytes
    pub fast_pool_bytes: usize,

    /// Size of the large (external RAM) pool in bytes (0 = not fitted)
    pub large_pool_bytes: usize,

    /// Numerator of the fraction of available fast memory above which the
    /// large pool is tried first
    pub large_first_num: usize,

    /// Denominator of that fraction
    pub large_first_den: usize,

    /// Failure policy for frame storage allocated by the capture task
    pub frame_policy: FailurePolicy,

    /// Failure policy for a session's private frame copy
    pub session_copy_policy: FailurePolicy,

    /// Delay between a device-fatal condition and the restart
    #[serde(with = "duration_ms", rename = "restart_delay_ms")]
    pub restart_delay: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            fast_pool_bytes: 256 * 1024,
            large_pool_bytes: 4 * 1024 * 1024,
            large_first_num: 2,
            large_first_den: 3,
            frame_policy: FailurePolicy::FailFast,
            session_copy_policy: FailurePolicy::BestEffort,
            restart_delay: Duration::from_secs(5),
        }
    }
}

impl MemoryConfig {
    /// Set the fast pool size
    pub fn fast_pool_bytes(mut self, bytes: usize) -> Self {
        self.fast_pool_bytes = bytes;
        self
    }

    /// Set the large pool size (0 disables the pool)
    pub fn large_pool_bytes(mut self, bytes: usize) -> Self {
        self.large_pool_bytes = bytes;
        self
    }

    /// Set the large-first threshold as a fraction of available fast memory
    pub fn large_first_threshold(mut self, num: usize, den: usize) -> Self {
        self.large_first_num = num;
        self.large_first_den = den;
        self
    }

    /// Set the failure policy for frame storage
    pub fn frame_policy(mut self, policy: FailurePolicy) -> Self {
        self.frame_policy = policy;
        self
    }

    /// Set the failure policy for session private copies
    pub fn session_copy_policy(mut self, policy: FailurePolicy) -> Self {
        self.session_copy_policy = policy;
        self
    }

    /// Set the restart delay
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }
}
