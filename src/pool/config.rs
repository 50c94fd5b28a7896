//! Frame pool configuration

use serde::{Deserialize, Serialize};

/// How captured frames are handed to sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Every session sees every frame published while it is connected
    Chained,
    /// Two slots; sessions see the newest frame when they ask
    DoubleBuffer,
    /// One shared slot; sessions copy the newest frame into a private buffer
    SessionCopy,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Chained => "chained",
            Strategy::DoubleBuffer => "double_buffer",
            Strategy::SessionCopy => "session_copy",
        };
        f.write_str(name)
    }
}

/// Frame pool configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Distribution strategy
    pub strategy: Strategy,

    /// Maximum frames kept for slow sessions by the chained strategy
    /// (0 = unbounded)
    pub max_backlog: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Chained,
            max_backlog: 30,
        }
    }
}

impl PoolConfig {
    /// Set the distribution strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the chained backlog bound (0 = unbounded)
    pub fn max_backlog(mut self, frames: usize) -> Self {
        self.max_backlog = frames;
        self
    }
}
