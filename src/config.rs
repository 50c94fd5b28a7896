//! Top-level configuration
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! [capture]
//! fps = 14
//! retry_delay_ms = 100
//!
//! [server]
//! bind_addr = "0.0.0.0:8080"
//! max_clients = 10
//!
//! [distribution]
//! strategy = "chained"
//! max_backlog = 30
//!
//! [memory]
//! fast_pool_bytes = 262144
//! large_pool_bytes = 4194304
//! frame_policy = "fail_fast"
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::alloc::MemoryConfig;
use crate::capture::CaptureConfig;
use crate::error::{Error, Result};
use crate::pool::{PoolConfig, Strategy};
use crate::server::ServerConfig;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub server: ServerConfig,
    pub distribution: PoolConfig,
    pub memory: MemoryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        if self.capture.fps == 0 || self.capture.fps > 120 {
            return Err(Error::config(format!(
                "capture.fps must be between 1 and 120, got {}",
                self.capture.fps
            )));
        }

        if self.server.max_clients == 0 {
            return Err(Error::config("server.max_clients must be > 0"));
        }

        if !self.server.stream_path.starts_with('/') {
            return Err(Error::config(format!(
                "server.stream_path must start with '/', got {:?}",
                self.server.stream_path
            )));
        }

        if self.memory.fast_pool_bytes == 0 {
            return Err(Error::config("memory.fast_pool_bytes must be > 0"));
        }

        if self.memory.large_first_den == 0 {
            return Err(Error::config("memory.large_first_den must be > 0"));
        }

        if self.server.session_stack_bytes > self.memory.fast_pool_bytes {
            return Err(Error::config(format!(
                "server.session_stack_bytes ({}) exceeds memory.fast_pool_bytes ({})",
                self.server.session_stack_bytes, self.memory.fast_pool_bytes
            )));
        }

        Ok(())
    }

    /// Set the capture frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.capture.fps = fps;
        self
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.server.bind_addr = addr;
        self
    }

    /// Set maximum concurrent clients
    pub fn max_clients(mut self, max: usize) -> Self {
        self.server.max_clients = max;
        self
    }

    /// Set the distribution strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.distribution.strategy = strategy;
        self
    }

    /// Replace the memory section
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }
}

/// Serde adapter storing a `Duration` as whole milliseconds
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
