//! Double-buffered broadcast
//!
//! Two slots. The capture task fills the inactive one and flips `current`;
//! sessions take a handle to whatever is current when they ask. There is no
//! history, so a slow session simply misses frames.
//!
//! A session's handle keeps its frame's storage alive while the (possibly
//! slow) network write runs without the pool lock. The capture task only
//! refills a slot's buffer in place once no session holds it.

use super::config::Strategy;
use super::frame::Frame;
use super::strategy::{Cursor, Delivery, Distribution};
use crate::alloc::PoolBuffer;
use crate::error::Result;

/// Two-slot broadcast
#[derive(Debug, Default)]
pub struct DoubleBuffer {
    slots: [Option<Frame>; 2],
    current: usize,
}

impl DoubleBuffer {
    /// Create an empty double buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame sessions currently see
    pub fn current(&self) -> Option<&Frame> {
        self.slots[self.current].as_ref()
    }
}

impl Distribution for DoubleBuffer {
    fn strategy(&self) -> Strategy {
        Strategy::DoubleBuffer
    }

    fn frame_capacity(&self, len: usize) -> usize {
        // Headroom so slightly larger frames refill the slot in place.
        len + len / 4
    }

    fn recycle(&mut self) -> Option<PoolBuffer> {
        self.slots[self.current ^ 1].take()?.try_reclaim()
    }

    fn publish(&mut self, frame: Frame, _active: usize) {
        let inactive = self.current ^ 1;
        self.slots[inactive] = Some(frame);
        self.current = inactive;
    }

    fn join(&mut self, cursor: &mut Cursor, next_seq: u64) {
        // The current frame is fair game for a newcomer.
        let start = self.current().map_or(next_seq, Frame::seq);
        cursor.start_at(start);
    }

    fn next_for(&mut self, cursor: &mut Cursor) -> Result<Option<Delivery>> {
        let Some(frame) = self.current() else {
            return Ok(None);
        };
        if !cursor.wants(frame.seq()) {
            return Ok(None);
        }

        let frame = frame.clone();
        cursor.advance(frame.seq());
        Ok(Some(Delivery::Shared(frame)))
    }

    fn drain(&mut self) -> usize {
        self.slots.iter_mut().filter_map(Option::take).count()
    }

    fn resident(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::alloc::{MemoryPool, PoolKind};

    fn frame(pool: &Arc<MemoryPool>, seq: u64, data: &[u8]) -> Frame {
        let mut buf = pool.try_alloc(data.len()).unwrap();
        assert!(buf.copy_from(data));
        Frame::new(seq, buf)
    }

    #[test]
    fn test_session_sees_latest_once() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut slots = DoubleBuffer::new();
        let mut cursor = Cursor::default();
        slots.join(&mut cursor, 0);

        assert!(slots.next_for(&mut cursor).unwrap().is_none());

        slots.publish(frame(&pool, 0, b"zero"), 1);
        slots.publish(frame(&pool, 1, b"one"), 1);
        assert_eq!(slots.resident(), 2);

        let delivered = slots.next_for(&mut cursor).unwrap().unwrap();
        assert_eq!(delivered.seq(), 1);
        assert_eq!(cursor.skipped(), 1);

        // Same frame is never served twice.
        assert!(slots.next_for(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_newcomer_starts_at_current() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut slots = DoubleBuffer::new();
        for seq in 0..4 {
            slots.publish(frame(&pool, seq, b"x"), 1);
        }

        let mut cursor = Cursor::default();
        slots.join(&mut cursor, 4);
        let delivered = slots.next_for(&mut cursor).unwrap().unwrap();
        assert_eq!(delivered.seq(), 3);
        assert_eq!(cursor.skipped(), 0);
    }

    #[test]
    fn test_recycle_only_unshared_slot() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut slots = DoubleBuffer::new();
        let mut cursor = Cursor::default();
        slots.join(&mut cursor, 0);

        slots.publish(frame(&pool, 0, b"zero"), 1);
        let Some(Delivery::Shared(held)) = slots.next_for(&mut cursor).unwrap() else {
            panic!("expected a shared frame");
        };
        slots.publish(frame(&pool, 1, b"one"), 1);

        // Slot holding frame 0 is inactive but a session is still writing it.
        assert!(slots.recycle().is_none());
        assert_eq!(held.data(), b"zero");
        drop(held);
        assert_eq!(pool.stats().live(), 1);

        // Frame 1 is current; nothing to recycle from the emptied slot.
        assert!(slots.recycle().is_none());
        slots.publish(frame(&pool, 2, b"two"), 1);

        let buf = slots.recycle().unwrap();
        assert_eq!(buf.as_slice(), b"one");
    }

    #[test]
    fn test_frame_capacity_headroom() {
        let slots = DoubleBuffer::new();
        assert_eq!(slots.frame_capacity(1000), 1250);
    }

    #[test]
    fn test_drain() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut slots = DoubleBuffer::new();
        slots.publish(frame(&pool, 0, b"a"), 1);
        slots.publish(frame(&pool, 1, b"b"), 1);

        assert_eq!(slots.drain(), 2);
        assert_eq!(slots.resident(), 0);
        assert_eq!(pool.stats().live(), 0);
    }
}
