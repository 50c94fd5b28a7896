//! Captured frames
//!
//! A frame is an encoded JPEG image plus its sequence number. Frames are
//! immutable once built and cheap to clone: clones share the same pool
//! buffer, which goes back to its allocator pool when the last clone drops.

use std::sync::Arc;

use crate::alloc::{PoolBuffer, PoolKind};

/// One captured frame
#[derive(Debug, Clone)]
pub struct Frame {
    inner: Arc<FrameData>,
}

#[derive(Debug)]
struct FrameData {
    seq: u64,
    buf: PoolBuffer,
}

impl Frame {
    /// Wrap a filled pool buffer as frame `seq`
    pub(crate) fn new(seq: u64, buf: PoolBuffer) -> Self {
        Self {
            inner: Arc::new(FrameData { seq, buf }),
        }
    }

    /// Sequence number, strictly increasing in capture order
    pub fn seq(&self) -> u64 {
        self.inner.seq
    }

    /// Encoded bytes
    pub fn data(&self) -> &[u8] {
        self.inner.buf.as_slice()
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.inner.buf.len()
    }

    /// Whether the frame holds no bytes
    pub fn is_empty(&self) -> bool {
        self.inner.buf.is_empty()
    }

    /// Pool the frame's storage came from
    pub fn pool_kind(&self) -> PoolKind {
        self.inner.buf.pool_kind()
    }

    /// Number of live handles to this frame
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Take the storage back if this is the last handle.
    ///
    /// When other handles remain, this one is dropped and `None` is
    /// returned; the storage is released later by whoever drops last.
    pub(crate) fn try_reclaim(self) -> Option<PoolBuffer> {
        Arc::try_unwrap(self.inner).ok().map(|data| data.buf)
    }
}
