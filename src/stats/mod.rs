//! Statistics and metrics

pub mod average;
pub mod metrics;

pub use average::RollingAverage;
pub use metrics::{CaptureStats, ServerCounters, ServerStats, SessionStats};
