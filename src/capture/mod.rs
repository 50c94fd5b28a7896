//! Frame capture
//!
//! A single task pulls encoded frames from the camera at a fixed rate and
//! publishes them into the frame pool. It only runs while at least one
//! client is connected.
//!
//! ```text
//!   ┌──────────── no sessions ────────────┐
//!   ▼                                     │
//! Suspended ── session joins ──► Running ─┘
//!                                  │
//!              capture → publish → yield → pace
//! ```

pub mod config;
pub mod task;

pub use config::CaptureConfig;
pub use task::{spawn_capture, CaptureHandle, CaptureState, CaptureTask};
