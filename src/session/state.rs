//! Session state machine
//!
//! Tracks a client session from admission to teardown.

use std::net::SocketAddr;

use tokio::time::Instant;

use crate::stats::SessionStats;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Header sent or being sent, waiting for the first frame
    Connecting,
    /// Sending frames
    Streaming,
    /// Releasing resources
    Disconnecting,
    /// Gone
    Terminated,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client closed the connection
    PeerClosed,
    /// A write failed
    WriteFailed,
    /// A write did not finish within the write timeout
    WriteTimeout,
    /// The session's private frame buffer could not be grown
    BufferUnavailable,
    /// The device is restarting
    DeviceFatal,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            DisconnectReason::PeerClosed => "peer closed",
            DisconnectReason::WriteFailed => "write failed",
            DisconnectReason::WriteTimeout => "write timed out",
            DisconnectReason::BufferUnavailable => "no session buffer",
            DisconnectReason::DeviceFatal => "device restart",
        };
        f.write_str(reason)
    }
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address, if known
    pub peer_addr: Option<SocketAddr>,

    /// Current phase
    pub phase: SessionPhase,

    /// Admission time
    pub connected_at: Instant,

    /// When the first frame went out
    pub first_frame_at: Option<Instant>,

    /// Why the session ended
    pub disconnect_reason: Option<DisconnectReason>,

    /// Frames and bytes sent
    pub stats: SessionStats,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            first_frame_at: None,
            disconnect_reason: None,
            stats: SessionStats::new(),
        }
    }

    /// First frame available, start streaming
    pub fn start_streaming(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Streaming;
        }
    }

    /// Begin teardown; the first reason given sticks
    pub fn disconnect(&mut self, reason: DisconnectReason) {
        if matches!(self.phase, SessionPhase::Connecting | SessionPhase::Streaming) {
            self.phase = SessionPhase::Disconnecting;
            self.disconnect_reason = Some(reason);
        }
    }

    /// Teardown finished
    pub fn terminate(&mut self) {
        if self.phase == SessionPhase::Disconnecting {
            self.phase = SessionPhase::Terminated;
            self.stats.duration = self.duration();
        }
    }

    /// Account for bytes written to the client
    pub fn add_bytes_sent(&mut self, bytes: usize) {
        self.stats.bytes_sent += bytes as u64;
    }

    /// Account for one frame written to the client
    pub fn record_frame(&mut self) {
        if self.first_frame_at.is_none() {
            self.first_frame_at = Some(Instant::now());
        }
        self.stats.frames_sent += 1;
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Check if session is streaming
    pub fn is_streaming(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    /// Check if the session is on its way out
    pub fn is_closing(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Disconnecting | SessionPhase::Terminated
        )
    }
}
