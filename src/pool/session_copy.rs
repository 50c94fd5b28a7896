//! Per-session cached copy
//!
//! The pool keeps only the latest frame. A session that is behind copies it
//! into a private buffer while holding the pool lock, then writes from its
//! copy at its own pace. Sessions never hold handles into the pool, so the
//! previous latest frame can always be refilled by the capture task.

use std::sync::Arc;

use super::config::Strategy;
use super::frame::Frame;
use super::strategy::{Cursor, Delivery, Distribution};
use crate::alloc::{Allocator, FailurePolicy, Placement, PoolBuffer};
use crate::error::{Error, Result};

/// Shared latest slot with private per-session copies
#[derive(Debug)]
pub struct SessionCopy {
    latest: Option<Frame>,
    spare: Option<PoolBuffer>,
    allocator: Arc<Allocator>,
    copy_policy: FailurePolicy,
}

impl SessionCopy {
    /// Create the strategy; private copies are grown from `allocator`
    /// under `copy_policy`
    pub fn new(allocator: Arc<Allocator>, copy_policy: FailurePolicy) -> Self {
        Self {
            latest: None,
            spare: None,
            allocator,
            copy_policy,
        }
    }

    fn ensure_private(&self, cursor: &mut Cursor, len: usize) -> Result<()> {
        if cursor.private().is_some_and(|buf| buf.capacity() >= len) {
            return Ok(());
        }

        let old = cursor.take_private();
        match self
            .allocator
            .acquire(old, len, self.copy_policy, Placement::Any)?
        {
            Some(buf) => {
                cursor.set_private(buf);
                Ok(())
            }
            None => Err(Error::BufferUnavailable { size: len }),
        }
    }
}

impl Distribution for SessionCopy {
    fn strategy(&self) -> Strategy {
        Strategy::SessionCopy
    }

    fn frame_capacity(&self, len: usize) -> usize {
        len + len / 4
    }

    fn recycle(&mut self) -> Option<PoolBuffer> {
        self.spare.take()
    }

    fn publish(&mut self, frame: Frame, _active: usize) {
        if let Some(previous) = self.latest.replace(frame) {
            self.spare = previous.try_reclaim();
        }
    }

    fn join(&mut self, cursor: &mut Cursor, next_seq: u64) {
        let start = self.latest.as_ref().map_or(next_seq, Frame::seq);
        cursor.start_at(start);
    }

    fn next_for(&mut self, cursor: &mut Cursor) -> Result<Option<Delivery>> {
        let Some(latest) = self.latest.as_ref() else {
            return Ok(None);
        };
        if !cursor.wants(latest.seq()) {
            return Ok(None);
        }

        let (seq, len) = (latest.seq(), latest.len());
        self.ensure_private(cursor, len)?;

        let copied = match (self.latest.as_ref(), cursor.private_mut()) {
            (Some(latest), Some(buf)) => buf.copy_from(latest.data()),
            _ => false,
        };
        if !copied {
            return Err(Error::BufferUnavailable { size: len });
        }

        cursor.advance(seq);
        Ok(Some(Delivery::Private { seq }))
    }

    fn drain(&mut self) -> usize {
        self.spare = None;
        usize::from(self.latest.take().is_some())
    }

    fn resident(&self) -> usize {
        usize::from(self.latest.is_some())
    }
}
