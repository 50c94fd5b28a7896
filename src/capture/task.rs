//! The capture loop
//!
//! One cycle per frame interval: grab a frame from the camera, publish it
//! into the pool, pace. With no sessions joined the loop drains the pool
//! and parks until the dispatcher admits someone.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::camera::{Camera, CameraError};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pacing::Pacer;
use crate::restart;
use crate::stats::RollingAverage;

/// Capture task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Not started yet
    Idle,
    /// Capturing and publishing frames
    Running,
    /// Parked until a session joins
    Suspended,
    /// Exited, either on request or after a device-fatal error
    Stopped,
}

/// The capture task, ready to run
pub struct CaptureTask<C> {
    ctx: Arc<Context>,
    camera: C,
    shutdown: watch::Receiver<bool>,
    rate: RollingAverage,
    last_publish: Option<Instant>,
}

impl<C: Camera> CaptureTask<C> {
    /// Create the task; it stops once `shutdown` turns true or its sender
    /// is dropped
    pub fn new(ctx: Arc<Context>, camera: C, shutdown: watch::Receiver<bool>) -> Self {
        let rate = RollingAverage::new(ctx.config().capture.rate_window);
        Self {
            ctx,
            camera,
            shutdown,
            rate,
            last_publish: None,
        }
    }

    /// Run until shutdown or a device-fatal error.
    ///
    /// A device-fatal error runs the restart path before it is returned, so
    /// by the time this returns `Err` the restart hook has already been
    /// invoked.
    pub async fn run(mut self) -> Result<()> {
        let config = self.ctx.config().capture.clone();
        let mut pacer = Pacer::new(config.frame_interval());

        tracing::info!(
            fps = config.fps,
            interval_ms = config.frame_interval().as_millis() as u64,
            "Capture task started"
        );
        self.ctx.set_capture_state(CaptureState::Running);

        let result = loop {
            if self.ctx.pool().active_sessions() == 0 {
                if !self.suspend().await {
                    break Ok(());
                }
                pacer.reset();
            }

            match self.cycle() {
                Ok(Some(seq)) => {
                    self.record_publish(seq);
                    tokio::task::yield_now().await;
                }
                Ok(None) => {
                    self.ctx.update_capture_stats(|s| s.frames_dropped += 1);
                    tracing::warn!("No buffer for frame, dropped");
                }
                Err(e) if e.is_device_fatal() => {
                    let delay = self.ctx.config().memory.restart_delay;
                    restart::device_fatal(self.ctx.restart_hook(), delay, &e).await;
                    break Err(e);
                }
                Err(e) => {
                    self.ctx.update_capture_stats(|s| s.camera_failures += 1);
                    tracing::warn!(error = %e, "Capture failed, retrying");
                    let retry = tokio::time::sleep(config.retry_delay);
                    if self.or_shutdown(retry).await.is_none() {
                        break Ok(());
                    }
                    continue;
                }
            }

            let tick = pacer.tick();
            match self.or_shutdown(tick).await {
                Some(true) => {}
                Some(false) => {
                    self.ctx.update_capture_stats(|s| s.missed_deadlines += 1);
                }
                None => break Ok(()),
            }
        };

        self.ctx.set_capture_state(CaptureState::Stopped);
        tracing::info!(stats = ?self.ctx.capture_stats(), "Capture task stopped");
        result
    }

    fn cycle(&mut self) -> Result<Option<u64>> {
        let frame = self.camera.capture()?;
        if frame.is_empty() {
            return Err(CameraError::EmptyFrame.into());
        }
        self.ctx.pool().publish(frame)
    }

    fn record_publish(&mut self, seq: u64) {
        let now = Instant::now();
        if let Some(prev) = self.last_publish.replace(now) {
            let elapsed = now.duration_since(prev).as_secs_f64();
            if elapsed > 0.0 {
                self.rate.push(1.0 / elapsed);
            }
        }

        let frame_rate = self.rate.value();
        self.ctx.update_capture_stats(|s| {
            s.frames_published += 1;
            s.frame_rate = frame_rate;
        });

        if seq == 0 {
            tracing::info!("First frame published");
        } else {
            tracing::trace!(seq = seq, fps = frame_rate, "Frame published");
        }
    }

    /// Drain the pool and park until a session joins.
    ///
    /// Returns `false` if shutdown was requested while parked.
    async fn suspend(&mut self) -> bool {
        let drained = self.ctx.pool().drain();
        self.ctx.set_capture_state(CaptureState::Suspended);
        self.ctx.update_capture_stats(|s| s.suspensions += 1);
        self.last_publish = None;
        let memory = self.ctx.allocator().stats();
        tracing::info!(
            drained = drained,
            fast_free = memory.fast.available(),
            fast_peak = memory.fast.peak,
            large_free = memory.large.map(|p| p.available()),
            large_peak = memory.large.map(|p| p.peak),
            "No clients, capture suspended"
        );

        let pool = Arc::clone(self.ctx.pool());
        let resumed = self.or_shutdown(pool.wait_for_demand()).await.is_some();
        if resumed {
            self.ctx.set_capture_state(CaptureState::Running);
            tracing::info!(
                active = self.ctx.pool().active_sessions(),
                "Client connected, capture resumed"
            );
        }
        resumed
    }

    /// Await `fut` unless shutdown is requested first
    async fn or_shutdown<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            out = fut => Some(out),
            _ = self.shutdown.wait_for(|stop| *stop) => None,
        }
    }
}

enum Join {
    Task(JoinHandle<Result<()>>),
    Thread(std::thread::JoinHandle<Result<()>>),
}

/// Handle to a running capture task
pub struct CaptureHandle {
    shutdown: watch::Sender<bool>,
    join: Join,
}

impl CaptureHandle {
    /// Ask the task to stop and wait for it
    pub async fn stop(self) -> Result<()> {
        self.shutdown.send_replace(true);
        self.join().await
    }

    /// Wait for the task to end on its own
    pub async fn join(self) -> Result<()> {
        let Self { shutdown, join } = self;
        let result = match join {
            Join::Task(handle) => handle
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?,
            Join::Thread(thread) => tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?
                .map_err(|_| Error::Io(std::io::Error::other("capture thread panicked")))?,
        };
        drop(shutdown);
        result
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        match &self.join {
            Join::Task(handle) => handle.is_finished(),
            Join::Thread(thread) => thread.is_finished(),
        }
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.join {
            Join::Task(_) => "task",
            Join::Thread(_) => "thread",
        };
        f.debug_struct("CaptureHandle").field("kind", &kind).finish()
    }
}

/// Start the capture task.
///
/// With `capture.core` set, the task gets its own OS thread pinned to that
/// core, running a single-threaded runtime. Otherwise it is spawned on the
/// current runtime.
pub fn spawn_capture<C: Camera>(ctx: Arc<Context>, camera: C) -> Result<CaptureHandle> {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let core = ctx.config().capture.core;
    let task = CaptureTask::new(ctx, camera, shutdown_rx);

    let join = match core {
        None => Join::Task(tokio::spawn(task.run())),
        Some(core) => {
            let thread = std::thread::Builder::new()
                .name("mjpeg-capture".into())
                .spawn(move || {
                    pin_to_core(core);
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()?;
                    runtime.block_on(task.run())
                })?;
            Join::Thread(thread)
        }
    };

    Ok(CaptureHandle { shutdown, join })
}

fn pin_to_core(core: usize) {
    let target = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == core));

    match target {
        Some(id) if core_affinity::set_for_current(id) => {
            tracing::info!(core = core, "Capture thread pinned");
        }
        Some(_) => tracing::warn!(core = core, "Failed to pin capture thread"),
        None => tracing::warn!(core = core, "No such core, capture thread not pinned"),
    }
}
