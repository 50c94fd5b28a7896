//! Chained distribution
//!
//! Frames are kept oldest-to-newest. When a frame is published, it records
//! how many sessions are connected; each of those sessions owes the frame
//! one read. Reading it, or leaving, settles the debt. The head of the
//! chain is dropped as soon as nobody owes it anything.
//!
//! Snapshotting the count at publication matters: a session that joins
//! later never reads older frames, so it must not be counted for them.
//!
//! ```text
//!   head                                   tail
//!    [5 owed=1] → [6 owed=2] → [7 owed=2] → [8 owed=2]
//!       ▲              ▲
//!   session A      session B (joined at 6)
//! ```

use std::collections::VecDeque;

use super::config::Strategy;
use super::frame::Frame;
use super::strategy::{Cursor, Delivery, Distribution};
use crate::error::Result;

#[derive(Debug)]
struct ChainEntry {
    frame: Frame,
    owed: usize,
}

/// Ordered backlog with per-frame read debts
#[derive(Debug, Default)]
pub struct Chained {
    chain: VecDeque<ChainEntry>,
    max_backlog: usize,
    evicted: u64,
}

impl Chained {
    /// Create a chain; `max_backlog` of 0 leaves it unbounded
    pub fn new(max_backlog: usize) -> Self {
        Self {
            chain: VecDeque::new(),
            max_backlog,
            evicted: 0,
        }
    }

    /// Sequence numbers currently in the chain, head first
    pub fn sequences(&self) -> Vec<u64> {
        self.chain.iter().map(|e| e.frame.seq()).collect()
    }

    fn position(&self, seq: u64) -> usize {
        self.chain.partition_point(|e| e.frame.seq() < seq)
    }

    fn reclaim(&mut self) {
        while self.chain.front().is_some_and(|e| e.owed == 0) {
            if let Some(entry) = self.chain.pop_front() {
                tracing::trace!(seq = entry.frame.seq(), "Frame reclaimed");
            }
        }
    }
}

impl Distribution for Chained {
    fn strategy(&self) -> Strategy {
        Strategy::Chained
    }

    fn publish(&mut self, frame: Frame, active: usize) {
        if active == 0 {
            // Nobody could ever read it.
            return;
        }

        self.chain.push_back(ChainEntry { frame, owed: active });

        if self.max_backlog > 0 {
            while self.chain.len() > self.max_backlog {
                if let Some(entry) = self.chain.pop_front() {
                    self.evicted += 1;
                    tracing::debug!(
                        seq = entry.frame.seq(),
                        owed = entry.owed,
                        "Backlog full, evicting oldest frame"
                    );
                }
            }
        }
    }

    fn join(&mut self, cursor: &mut Cursor, next_seq: u64) {
        cursor.start_at(next_seq);
    }

    fn next_for(&mut self, cursor: &mut Cursor) -> Result<Option<Delivery>> {
        let idx = self.position(cursor.next_seq());
        let Some(entry) = self.chain.get_mut(idx) else {
            return Ok(None);
        };

        entry.owed = entry.owed.saturating_sub(1);
        let frame = entry.frame.clone();
        cursor.advance(frame.seq());

        self.reclaim();
        Ok(Some(Delivery::Shared(frame)))
    }

    fn leave(&mut self, cursor: &Cursor) {
        let idx = self.position(cursor.next_seq());
        for entry in self.chain.iter_mut().skip(idx) {
            entry.owed = entry.owed.saturating_sub(1);
        }
        self.reclaim();
    }

    fn evicted(&self) -> u64 {
        self.evicted
    }

    fn drain(&mut self) -> usize {
        let drained = self.chain.len();
        self.chain.clear();
        drained
    }

    fn resident(&self) -> usize {
        self.chain.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::{prop_assert, prop_assert_eq, prop_oneof, proptest, Just};
    use proptest::strategy::Strategy as _;

    use super::*;
    use crate::alloc::{MemoryPool, PoolKind};

    fn frame(pool: &Arc<MemoryPool>, seq: u64) -> Frame {
        let mut buf = pool.try_alloc(8).unwrap();
        assert!(buf.copy_from(&seq.to_be_bytes()));
        Frame::new(seq, buf)
    }

    fn seq_of(delivery: Option<Delivery>) -> Option<u64> {
        delivery.map(|d| d.seq())
    }

    fn joined(chain: &mut Chained, next_seq: u64) -> Cursor {
        let mut cursor = Cursor::default();
        chain.join(&mut cursor, next_seq);
        cursor
    }

    #[test]
    fn test_single_session_reads_in_order_and_reclaims() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(0);
        let mut a = joined(&mut chain, 0);

        for seq in 0..3 {
            chain.publish(frame(&pool, seq), 1);
        }
        assert_eq!(chain.resident(), 3);

        for seq in 0..3 {
            let delivered = chain.next_for(&mut a).unwrap();
            assert_eq!(seq_of(delivered), Some(seq));
        }
        assert!(chain.next_for(&mut a).unwrap().is_none());
        assert_eq!(chain.resident(), 0);
        assert_eq!(pool.stats().live(), 0);
    }

    #[test]
    fn test_head_kept_until_every_session_read_it() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(0);
        let mut a = joined(&mut chain, 0);
        let mut b = joined(&mut chain, 0);

        chain.publish(frame(&pool, 0), 2);
        chain.publish(frame(&pool, 1), 2);

        assert_eq!(seq_of(chain.next_for(&mut a).unwrap()), Some(0));
        assert_eq!(seq_of(chain.next_for(&mut a).unwrap()), Some(1));
        assert_eq!(chain.sequences(), vec![0, 1]);

        assert_eq!(seq_of(chain.next_for(&mut b).unwrap()), Some(0));
        assert_eq!(chain.sequences(), vec![1]);
        assert_eq!(seq_of(chain.next_for(&mut b).unwrap()), Some(1));
        assert!(chain.sequences().is_empty());
    }

    #[test]
    fn test_late_joiner_does_not_stall_reclamation() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(0);
        let mut a = joined(&mut chain, 0);

        for seq in 0..4 {
            chain.publish(frame(&pool, seq), 1);
        }

        // B joins after frame 3: it starts at the next published frame and
        // owes nothing on 0..=3.
        let mut b = joined(&mut chain, 4);
        chain.publish(frame(&pool, 4), 2);

        for seq in 0..5 {
            assert_eq!(seq_of(chain.next_for(&mut a).unwrap()), Some(seq));
        }
        assert_eq!(chain.sequences(), vec![4]);

        assert_eq!(seq_of(chain.next_for(&mut b).unwrap()), Some(4));
        assert_eq!(chain.resident(), 0);
    }

    #[test]
    fn test_leave_releases_owed_frames() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(0);
        let mut a = joined(&mut chain, 0);
        let b = joined(&mut chain, 0);

        for seq in 0..3 {
            chain.publish(frame(&pool, seq), 2);
        }
        assert_eq!(seq_of(chain.next_for(&mut a).unwrap()), Some(0));
        assert_eq!(chain.resident(), 3);

        // B never read anything; its leaving frees frame 0 and leaves the
        // rest for A alone.
        chain.leave(&b);
        assert_eq!(chain.sequences(), vec![1, 2]);

        chain.leave(&a);
        assert_eq!(chain.resident(), 0);
        assert_eq!(pool.stats().live(), 0);
    }

    #[test]
    fn test_publish_without_sessions_is_dropped() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(0);

        chain.publish(frame(&pool, 0), 0);
        assert_eq!(chain.resident(), 0);
        assert_eq!(pool.stats().live(), 0);
    }

    #[test]
    fn test_backlog_bound_evicts_and_session_skips() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(2);
        let mut stalled = joined(&mut chain, 0);

        for seq in 0..5 {
            chain.publish(frame(&pool, seq), 1);
        }
        assert_eq!(chain.sequences(), vec![3, 4]);
        assert_eq!(chain.evicted(), 3);

        assert_eq!(seq_of(chain.next_for(&mut stalled).unwrap()), Some(3));
        assert_eq!(stalled.skipped(), 3);
        assert_eq!(seq_of(chain.next_for(&mut stalled).unwrap()), Some(4));
        assert_eq!(pool.stats().live(), 0);
    }

    #[test]
    fn test_held_frame_outlives_reclamation() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(0);
        let mut a = joined(&mut chain, 0);

        chain.publish(frame(&pool, 0), 1);
        let Some(Delivery::Shared(held)) = chain.next_for(&mut a).unwrap() else {
            panic!("expected a shared frame");
        };

        // Reclaimed from the chain, but the session is still writing it.
        assert_eq!(chain.resident(), 0);
        assert_eq!(pool.stats().live(), 1);
        assert_eq!(held.data(), &0u64.to_be_bytes());

        drop(held);
        assert_eq!(pool.stats().live(), 0);
    }

    #[test]
    fn test_drain() {
        let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1024));
        let mut chain = Chained::new(0);
        let _a = joined(&mut chain, 0);

        for seq in 5..10 {
            chain.publish(frame(&pool, seq), 1);
        }
        assert_eq!(chain.drain(), 5);
        assert_eq!(chain.resident(), 0);
        assert_eq!(pool.stats().live(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Publish,
        Join,
        Read(usize),
        Leave(usize),
    }

    fn op() -> impl proptest::strategy::Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Publish),
            1 => Just(Op::Join),
            4 => (0usize..8).prop_map(Op::Read),
            1 => (0usize..8).prop_map(Op::Leave),
        ]
    }

    struct ModelSession {
        cursor: Cursor,
        seen: Vec<u64>,
    }

    proptest! {
        #[test]
        fn chained_reclaims_exactly_what_nobody_owes(ops in proptest::collection::vec(op(), 1..200)) {
            let pool = Arc::new(MemoryPool::new(PoolKind::Fast, 1 << 20));
            let mut chain = Chained::new(0);
            let mut sessions: Vec<ModelSession> = Vec::new();
            // seq -> indexes (into `owers`) of sessions counted at publication
            let mut published: Vec<(u64, Vec<usize>)> = Vec::new();
            let mut alive: Vec<bool> = Vec::new();
            let mut next_seq = 0u64;

            for op in ops {
                match op {
                    Op::Publish => {
                        let active: Vec<usize> =
                            (0..sessions.len()).filter(|&i| alive[i]).collect();
                        chain.publish(frame(&pool, next_seq), active.len());
                        published.push((next_seq, active));
                        next_seq += 1;
                    }
                    Op::Join => {
                        let cursor = joined(&mut chain, next_seq);
                        sessions.push(ModelSession { cursor, seen: Vec::new() });
                        alive.push(true);
                    }
                    Op::Read(i) => {
                        if let Some(i) = (0..sessions.len()).filter(|&j| alive[j]).nth(i) {
                            let s = &mut sessions[i];
                            let expected = published
                                .iter()
                                .find(|(seq, owers)| *seq >= s.cursor.next_seq() && owers.contains(&i))
                                .map(|(seq, _)| *seq);
                            let got = chain.next_for(&mut s.cursor).unwrap().map(|d| d.seq());
                            // Never freed early: the next owed frame is still there.
                            prop_assert_eq!(got, expected);
                            if let Some(seq) = got {
                                s.seen.push(seq);
                            }
                        }
                    }
                    Op::Leave(i) => {
                        if let Some(i) = (0..sessions.len()).filter(|&j| alive[j]).nth(i) {
                            chain.leave(&sessions[i].cursor);
                            alive[i] = false;
                        }
                    }
                }

                // Freed exactly when nobody owes: resident frames are those
                // some live session still has to read.
                let owed = published
                    .iter()
                    .filter(|(seq, owers)| {
                        owers.iter().any(|&i| alive[i] && sessions[i].cursor.next_seq() <= *seq)
                    })
                    .count();
                prop_assert_eq!(chain.resident(), owed);
                prop_assert_eq!(pool.stats().live() as usize, owed);
            }

            for s in &sessions {
                prop_assert!(s.seen.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(s.cursor.skipped(), 0);
            }

            chain.drain();
            let stats = pool.stats();
            prop_assert_eq!(stats.allocations, stats.releases);
        }
    }
}
