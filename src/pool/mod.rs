//! Frame buffer pool
//!
//! The pool sits between the single capture task and every client session.
//! It decides how long a captured frame lives and who may read it.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<FramePool>
//!                 ┌──────────────────────────┐
//!                 │ Mutex<PoolState {        │
//!                 │   dist: Box<dyn          │
//!                 │     Distribution>,       │
//!                 │   active, next_seq,      │
//!                 │ }>                       │
//!                 │ demand: watch<usize>     │
//!                 │ latest: watch<Option<u64>>│
//!                 └────────────┬─────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!   [Capture]             [Membership]          [Membership]
//!   publish(bytes)        next() → Frame        next() → copy
//!                              │                     │
//!                              └──► write outside the lock ──► client
//! ```
//!
//! # Strategies
//!
//! - [`Chained`]: every session sees every frame published while it is
//!   joined, up to a bounded backlog.
//! - [`DoubleBuffer`]: two slots, sessions see the newest frame.
//! - [`SessionCopy`]: one slot, sessions copy the newest frame into a
//!   private buffer.
//!
//! Frames are reference-counted handles over pool buffers, so a frame's
//! storage goes back to the allocator when the pool and every session that
//! read it have let go.

pub mod chained;
pub mod config;
pub mod double;
pub mod frame;
pub mod session_copy;
pub mod store;
pub mod strategy;

pub use chained::Chained;
pub use config::{PoolConfig, Strategy};
pub use double::DoubleBuffer;
pub use frame::Frame;
pub use session_copy::SessionCopy;
pub use store::{FramePool, FramePoolStats, Membership};
pub use strategy::{Cursor, Delivery, Distribution};
