//! Statistics for sessions, the capture task and the server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Session-level statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Frames written to the client
    pub frames_sent: u64,
    /// Bytes written to the client, framing included
    pub bytes_sent: u64,
    /// Frames that went by without this session sending them
    pub frames_skipped: u64,
    /// Time from admission to teardown
    pub duration: Duration,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average frames per second over the session
    pub fn frame_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Average bits per second over the session
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

/// Capture task statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureStats {
    /// Frames published into the pool
    pub frames_published: u64,
    /// Camera reads that failed
    pub camera_failures: u64,
    /// Frames dropped for lack of a buffer
    pub frames_dropped: u64,
    /// Times the task suspended for lack of clients
    pub suspensions: u64,
    /// Cycles that overran the frame interval
    pub missed_deadlines: u64,
    /// Rolling average of the achieved frame rate
    pub frame_rate: f64,
}

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Clients admitted
    pub accepted: u64,
    /// Clients turned away at the concurrency cap
    pub rejected: u64,
    /// Clients dropped because no session record could be reserved
    pub failed: u64,
    /// Sessions that have ended
    pub completed: u64,
    /// Frames written across all sessions
    pub frames_sent: u64,
    /// Bytes written across all sessions
    pub bytes_sent: u64,
}

impl ServerStats {
    /// Sessions admitted and not yet ended
    pub fn active(&self) -> u64 {
        self.accepted.saturating_sub(self.completed)
    }
}

/// Live server counters, shared by the dispatcher and sessions
#[derive(Debug, Default)]
pub struct ServerCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    completed: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl ServerCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold a finished session into the totals
    pub fn record_completed(&self, session: &SessionStats) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.frames_sent
            .fetch_add(session.frames_sent, Ordering::Relaxed);
        self.bytes_sent.fetch_add(session.bytes_sent, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_stats_new() {
        let stats = SessionStats::new();
        assert_eq!(stats.frames_sent, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.frames_skipped, 0);
        assert_eq!(stats.bitrate(), 0);
    }

    #[test]
    fn test_session_rates() {
        let stats = SessionStats {
            frames_sent: 50,
            bytes_sent: 1_000_000,
            frames_skipped: 0,
            duration: Duration::from_secs(10),
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate(), 800_000);
        assert_eq!(stats.frame_rate(), 5.0);
    }

    #[test]
    fn test_session_rates_zero_duration() {
        let stats = SessionStats {
            frames_sent: 3,
            bytes_sent: 1000,
            ..SessionStats::default()
        };
        assert_eq!(stats.bitrate(), 0);
        assert_eq!(stats.frame_rate(), 0.0);
    }

    #[test]
    fn test_server_counters() {
        let counters = ServerCounters::new();
        counters.record_accepted();
        counters.record_accepted();
        counters.record_rejected();
        counters.record_failed();
        counters.record_completed(&SessionStats {
            frames_sent: 4,
            bytes_sent: 400,
            ..SessionStats::default()
        });

        let stats = counters.snapshot();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active(), 1);
        assert_eq!(stats.frames_sent, 4);
        assert_eq!(stats.bytes_sent, 400);
    }
}
