//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::protocol::STREAM_PATH;

/// Server configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Request path that serves the MJPEG stream
    pub stream_path: String,

    /// Maximum concurrent streaming clients
    pub max_clients: usize,

    /// Bound on each network write; hitting it ends the session
    #[serde(with = "duration_ms", rename = "write_timeout_ms")]
    pub write_timeout: Duration,

    /// Time allowed for a client to send its request head
    #[serde(with = "duration_ms", rename = "request_timeout_ms")]
    pub request_timeout: Duration,

    /// Largest request head accepted
    pub max_request_bytes: usize,

    /// Fast-pool bytes reserved per session for its record
    pub session_stack_bytes: usize,

    /// How often a session waiting for its first frame checks its client
    #[serde(with = "duration_ms", rename = "first_frame_poll_ms")]
    pub first_frame_poll: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            stream_path: STREAM_PATH.to_string(),
            max_clients: 10,
            write_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            max_request_bytes: 4096,
            session_stack_bytes: 3 * 1024,
            first_frame_poll: Duration::from_millis(100),
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the stream path
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Set maximum concurrent clients
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Set the per-write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the request head timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the per-session record reservation
    pub fn session_stack_bytes(mut self, bytes: usize) -> Self {
        self.session_stack_bytes = bytes;
        self
    }
}
