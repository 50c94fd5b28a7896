//! Shared server context
//!
//! Everything the capture task, the dispatcher and the sessions share lives
//! here, built once at startup and handed around as `Arc<Context>`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::alloc::Allocator;
use crate::capture::CaptureState;
use crate::config::Config;
use crate::error::Result;
use crate::pool::FramePool;
use crate::restart::{ProcessRestart, RestartHook};
use crate::stats::{CaptureStats, ServerCounters, ServerStats};

/// Allocator, frame pool, capture state, restart hook and statistics
pub struct Context {
    config: Config,
    allocator: Arc<Allocator>,
    pool: Arc<FramePool>,
    capture_state: watch::Sender<CaptureState>,
    capture_stats: Mutex<CaptureStats>,
    counters: ServerCounters,
    restart: Arc<dyn RestartHook>,
}

impl Context {
    /// Build a context that restarts by exiting the process
    pub fn new(config: Config) -> Result<Arc<Self>> {
        Self::with_restart_hook(config, Arc::new(ProcessRestart))
    }

    /// Build a context with a custom restart hook
    pub fn with_restart_hook(config: Config, restart: Arc<dyn RestartHook>) -> Result<Arc<Self>> {
        config.validate()?;

        let allocator = Arc::new(Allocator::new(&config.memory));
        let pool = Arc::new(FramePool::new(
            &config.distribution,
            Arc::clone(&allocator),
            config.memory.frame_policy,
            config.memory.session_copy_policy,
        ));
        let (capture_state, _) = watch::channel(CaptureState::Idle);

        tracing::info!(
            strategy = %config.distribution.strategy,
            fps = config.capture.fps,
            max_clients = config.server.max_clients,
            fast_pool = config.memory.fast_pool_bytes,
            large_pool = config.memory.large_pool_bytes,
            "Context created"
        );

        Ok(Arc::new(Self {
            config,
            allocator,
            pool,
            capture_state,
            capture_stats: Mutex::new(CaptureStats::default()),
            counters: ServerCounters::new(),
            restart,
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    pub fn pool(&self) -> &Arc<FramePool> {
        &self.pool
    }

    pub fn restart_hook(&self) -> &dyn RestartHook {
        self.restart.as_ref()
    }

    /// Current capture state
    pub fn capture_state(&self) -> CaptureState {
        *self.capture_state.borrow()
    }

    /// Watch capture state changes
    pub fn subscribe_capture_state(&self) -> watch::Receiver<CaptureState> {
        self.capture_state.subscribe()
    }

    pub(crate) fn set_capture_state(&self, state: CaptureState) {
        self.capture_state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::debug!(from = ?*current, to = ?state, "Capture state changed");
            *current = state;
            true
        });
    }

    /// Snapshot capture statistics
    pub fn capture_stats(&self) -> CaptureStats {
        self.capture_stats.lock().clone()
    }

    pub(crate) fn update_capture_stats(&self, f: impl FnOnce(&mut CaptureStats)) {
        f(&mut self.capture_stats.lock());
    }

    pub(crate) fn counters(&self) -> &ServerCounters {
        &self.counters
    }

    /// Snapshot server statistics
    pub fn server_stats(&self) -> ServerStats {
        self.counters.snapshot()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("capture_state", &self.capture_state())
            .finish_non_exhaustive()
    }
}
