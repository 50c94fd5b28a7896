//! The capture-to-session hand-off interface
//!
//! Each strategy decides what a publish does to the pool and what a session
//! gets when it asks for its next frame. All of them run under the pool
//! lock, so implementations only ever see one caller at a time.

use super::config::Strategy;
use super::frame::Frame;
use crate::alloc::PoolBuffer;
use crate::error::Result;

/// Per-session read position
///
/// `next_seq` is the lowest sequence number the session will still accept.
/// It only ever moves forward, which is what keeps delivery strictly
/// ordered and free of repeats.
#[derive(Debug, Default)]
pub struct Cursor {
    next_seq: u64,
    skipped: u64,
    delivered: u64,
    private: Option<PoolBuffer>,
}

impl Cursor {
    /// Lowest sequence number still acceptable
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Frames that went by without this session reading them
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Frames handed to this session
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Whether frame `seq` is new to this session
    pub fn wants(&self, seq: u64) -> bool {
        seq >= self.next_seq
    }

    /// Position the cursor for a freshly joined session
    pub fn start_at(&mut self, seq: u64) {
        self.next_seq = seq;
    }

    /// Record delivery of frame `seq`.
    pub fn advance(&mut self, seq: u64) {
        debug_assert!(self.wants(seq), "cursor moved backwards");
        self.skipped += seq.saturating_sub(self.next_seq);
        self.next_seq = seq + 1;
        self.delivered += 1;
    }

    /// The session's private frame copy, if any
    pub fn private(&self) -> Option<&PoolBuffer> {
        self.private.as_ref()
    }

    /// Mutable access to the private copy
    pub fn private_mut(&mut self) -> Option<&mut PoolBuffer> {
        self.private.as_mut()
    }

    /// Take the private copy out, e.g. to regrow it
    pub fn take_private(&mut self) -> Option<PoolBuffer> {
        self.private.take()
    }

    /// Install a private copy
    pub fn set_private(&mut self, buf: PoolBuffer) {
        self.private = Some(buf);
    }
}

/// What a session gets from [`Distribution::next_for`]
#[derive(Debug)]
pub enum Delivery {
    /// A handle to the pool's frame; keeps its storage alive while held
    Shared(Frame),
    /// The frame was copied into the cursor's private buffer
    Private { seq: u64 },
}

impl Delivery {
    /// Sequence number of the delivered frame
    pub fn seq(&self) -> u64 {
        match self {
            Delivery::Shared(frame) => frame.seq(),
            Delivery::Private { seq } => *seq,
        }
    }
}

/// A frame distribution strategy
pub trait Distribution: Send {
    /// Which strategy this is
    fn strategy(&self) -> Strategy;

    /// Capacity to allocate for a frame of `len` bytes
    fn frame_capacity(&self, len: usize) -> usize {
        len
    }

    /// A buffer the capture task may refill instead of allocating
    fn recycle(&mut self) -> Option<PoolBuffer> {
        None
    }

    /// Make `frame` available; `active` sessions are connected right now
    fn publish(&mut self, frame: Frame, active: usize);

    /// Position a new session's cursor; `next_seq` is the next sequence
    /// number that will be published
    fn join(&mut self, cursor: &mut Cursor, next_seq: u64);

    /// The next frame `cursor` has not seen, if any
    fn next_for(&mut self, cursor: &mut Cursor) -> Result<Option<Delivery>>;

    /// Forget a departing session
    fn leave(&mut self, _cursor: &Cursor) {}

    /// Drop every resident frame; returns how many were dropped
    fn drain(&mut self) -> usize;

    /// Frames currently held by the pool
    fn resident(&self) -> usize;

    /// Frames dropped before every session owing them had read them
    fn evicted(&self) -> u64 {
        0
    }
}
