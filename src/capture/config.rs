//! Capture configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;

/// Capture task configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target frame rate; sessions pace at the same rate
    pub fps: u32,

    /// Back-off after a failed camera read
    #[serde(with = "duration_ms", rename = "retry_delay_ms")]
    pub retry_delay: Duration,

    /// CPU core to pin the capture task to (None = run on the runtime)
    pub core: Option<usize>,

    /// Samples in the rolling frame-rate average
    pub rate_window: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 14,
            retry_delay: Duration::from_millis(100),
            core: None,
            rate_window: 10,
        }
    }
}

impl CaptureConfig {
    /// Set the target frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the camera retry back-off
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Pin capture to a core
    pub fn core(mut self, core: usize) -> Self {
        self.core = Some(core);
        self
    }

    /// Time between frames at the target rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();

        assert_eq!(config.fps, 14);
        assert_eq!(config.retry_delay, Duration::from_millis(100));
        assert!(config.core.is_none());
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(
            CaptureConfig::default().fps(25).frame_interval(),
            Duration::from_millis(40)
        );
        // A zero rate is rejected by validation; the interval stays finite.
        assert_eq!(
            CaptureConfig::default().fps(0).frame_interval(),
            Duration::from_secs(1)
        );
    }
}
