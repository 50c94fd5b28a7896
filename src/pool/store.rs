//! Frame pool implementation
//!
//! The pool owns the distribution strategy, the active-session count and the
//! sequence counter, all behind one lock. The lock is only held for
//! bookkeeping and byte copies, never across an await point.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::config::{PoolConfig, Strategy};
use super::frame::Frame;
use super::session_copy::SessionCopy;
use super::strategy::{Cursor, Delivery, Distribution};
use super::{chained::Chained, double::DoubleBuffer};
use crate::alloc::{Allocator, FailurePolicy, Placement, PoolBuffer};
use crate::error::{Error, Result};

struct PoolState {
    dist: Box<dyn Distribution>,
    active: usize,
    next_seq: u64,
    published: u64,
    dropped: u64,
}

/// Pool statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePoolStats {
    pub strategy: Strategy,
    pub active_sessions: usize,
    pub resident_frames: usize,
    pub frames_published: u64,
    /// Capture cycles dropped because no frame buffer could be found
    pub frames_dropped: u64,
    /// Frames evicted from a full backlog
    pub frames_evicted: u64,
}

/// Shared frame pool
///
/// Created once and shared via `Arc` between the capture task, the
/// dispatcher and every session.
pub struct FramePool {
    state: Mutex<PoolState>,
    allocator: Arc<Allocator>,
    frame_policy: FailurePolicy,
    demand: watch::Sender<usize>,
    latest: watch::Sender<Option<u64>>,
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("stats", &self.stats())
            .field("frame_policy", &self.frame_policy)
            .finish()
    }
}

impl FramePool {
    /// Create a pool using the strategy named in `config`
    ///
    /// Frame storage is taken from `allocator` under `frame_policy`; the
    /// per-session copy strategy grows private buffers under `copy_policy`.
    pub fn new(
        config: &PoolConfig,
        allocator: Arc<Allocator>,
        frame_policy: FailurePolicy,
        copy_policy: FailurePolicy,
    ) -> Self {
        let dist: Box<dyn Distribution> = match config.strategy {
            Strategy::Chained => Box::new(Chained::new(config.max_backlog)),
            Strategy::DoubleBuffer => Box::new(DoubleBuffer::new()),
            Strategy::SessionCopy => {
                Box::new(SessionCopy::new(Arc::clone(&allocator), copy_policy))
            }
        };
        Self::with_distribution(dist, allocator, frame_policy)
    }

    /// Create a pool around an already built strategy
    pub fn with_distribution(
        dist: Box<dyn Distribution>,
        allocator: Arc<Allocator>,
        frame_policy: FailurePolicy,
    ) -> Self {
        let (demand, _) = watch::channel(0);
        let (latest, _) = watch::channel(None);

        Self {
            state: Mutex::new(PoolState {
                dist,
                active: 0,
                next_seq: 0,
                published: 0,
                dropped: 0,
            }),
            allocator,
            frame_policy,
            demand,
            latest,
        }
    }

    /// Distribution strategy in use
    pub fn strategy(&self) -> Strategy {
        self.state.lock().dist.strategy()
    }

    /// Allocator frames are taken from
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    /// Sessions currently joined
    pub fn active_sessions(&self) -> usize {
        self.state.lock().active
    }

    /// Frames currently held by the pool
    pub fn resident(&self) -> usize {
        self.state.lock().dist.resident()
    }

    /// Snapshot statistics
    pub fn stats(&self) -> FramePoolStats {
        let state = self.state.lock();
        FramePoolStats {
            strategy: state.dist.strategy(),
            active_sessions: state.active,
            resident_frames: state.dist.resident(),
            frames_published: state.published,
            frames_dropped: state.dropped,
            frames_evicted: state.dist.evicted(),
        }
    }

    /// Join as a new session, unless `max_sessions` are already joined.
    ///
    /// The cap check and the increment happen under the same lock, so
    /// concurrent admissions can never overshoot it.
    pub fn try_join(self: &Arc<Self>, max_sessions: usize) -> Option<Membership> {
        let mut cursor = Cursor::default();
        {
            let mut state = self.state.lock();
            if state.active >= max_sessions {
                return None;
            }
            state.active += 1;
            let next_seq = state.next_seq;
            state.dist.join(&mut cursor, next_seq);
            self.demand.send_replace(state.active);

            tracing::debug!(
                active = state.active,
                start_seq = cursor.next_seq(),
                "Session joined pool"
            );
        }

        Some(Membership {
            pool: Arc::clone(self),
            cursor,
        })
    }

    fn leave(&self, cursor: &Cursor) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        state.dist.leave(cursor);
        self.demand.send_replace(state.active);

        tracing::debug!(
            active = state.active,
            delivered = cursor.delivered(),
            skipped = cursor.skipped(),
            resident = state.dist.resident(),
            "Session left pool"
        );
    }

    /// Publish one captured frame.
    ///
    /// The buffer is found and filled without the lock held; only the
    /// hand-over to the strategy and the sequence bump happen under it.
    /// Returns the new frame's sequence number, or `None` when no buffer
    /// could be found under the best-effort policy and the frame was
    /// dropped.
    pub fn publish(&self, data: &[u8]) -> Result<Option<u64>> {
        let (recycled, capacity) = {
            let mut state = self.state.lock();
            (state.dist.recycle(), state.dist.frame_capacity(data.len()))
        };

        let buf = match recycled {
            Some(buf) if buf.capacity() >= data.len() => Some(buf),
            old => {
                self.allocator
                    .acquire(old, capacity, self.frame_policy, Placement::Any)?
            }
        };
        let Some(mut buf) = buf else {
            self.state.lock().dropped += 1;
            return Ok(None);
        };
        if !buf.copy_from(data) {
            return Err(Error::BufferUnavailable { size: data.len() });
        }

        let seq = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.published += 1;
            let active = state.active;
            state.dist.publish(Frame::new(seq, buf), active);
            seq
        };
        self.latest.send_replace(Some(seq));

        Ok(Some(seq))
    }

    fn next_for(&self, cursor: &mut Cursor) -> Result<Option<Delivery>> {
        self.state.lock().dist.next_for(cursor)
    }

    /// Drop every resident frame; returns how many were dropped
    pub fn drain(&self) -> usize {
        let drained = self.state.lock().dist.drain();
        if drained > 0 {
            tracing::debug!(frames = drained, "Pool drained");
        }
        drained
    }

    /// Watch the active-session count
    pub fn subscribe_demand(&self) -> watch::Receiver<usize> {
        self.demand.subscribe()
    }

    /// Watch the sequence number of the latest published frame
    pub fn subscribe_published(&self) -> watch::Receiver<Option<u64>> {
        self.latest.subscribe()
    }

    /// Wait until at least one session is joined
    pub async fn wait_for_demand(&self) {
        let mut rx = self.demand.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|active| *active > 0).await;
    }

    /// Wait until the first frame ever has been published
    pub async fn wait_first_frame(&self) {
        let mut rx = self.latest.subscribe();
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Whether a frame has ever been published
    pub fn has_published(&self) -> bool {
        self.latest.borrow().is_some()
    }

    /// Sequence number of the latest published frame
    pub fn latest_seq(&self) -> Option<u64> {
        *self.latest.borrow()
    }
}

/// A session's place in the pool
///
/// Holds the session's cursor and, for the per-session copy strategy, its
/// private buffer. Dropping it leaves the pool: the active count goes down
/// and anything the session still owed is settled. That happens exactly
/// once, whether the session ended normally, was aborted or panicked.
pub struct Membership {
    pool: Arc<FramePool>,
    cursor: Cursor,
}

impl Membership {
    /// The next frame this session has not seen, if one is available
    ///
    /// For [`Delivery::Private`] the bytes are in [`Membership::private_bytes`].
    pub fn next(&mut self) -> Result<Option<Delivery>> {
        self.pool.next_for(&mut self.cursor)
    }

    /// Bytes of the last privately copied frame
    pub fn private_bytes(&self) -> Option<&[u8]> {
        self.cursor.private().map(PoolBuffer::as_slice)
    }

    /// Capacity of the private buffer, 0 if none
    pub fn private_capacity(&self) -> usize {
        self.cursor.private().map_or(0, PoolBuffer::capacity)
    }

    /// Give the private buffer back to its pool
    pub fn release_private(&mut self) {
        drop(self.cursor.take_private());
    }

    /// Read position
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Pool this membership belongs to
    pub fn pool(&self) -> &Arc<FramePool> {
        &self.pool
    }
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.pool.leave(&self.cursor);
    }
}
