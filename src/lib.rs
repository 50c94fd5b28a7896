//! Multi-client MJPEG streaming for memory-constrained camera devices
//!
//! One capture task pulls JPEG frames from a camera and publishes them into
//! a shared frame pool; every connected client has its own session task that
//! reads frames out of the pool and writes them as a
//! `multipart/x-mixed-replace` HTTP response.
//!
//! ```text
//!   Camera ─► CaptureTask ─► FramePool ─┬─► Session ─► client
//!                  ▲                    ├─► Session ─► client
//!                  │                    └─► Session ─► client
//!                  └── active sessions ◄── Dispatcher ◄── MjpegServer
//! ```
//!
//! Frame storage comes from a dual-pool [`alloc::Allocator`] that models a
//! small fast region and an optional large slow one. How long a frame lives
//! and who may read it is decided by the pool's distribution strategy (see
//! [`pool`]).
//!
//! # Example
//!
//! ```no_run
//! use mjpeg_rs::camera::ReplayCamera;
//! use mjpeg_rs::{spawn_capture, Config, Context, MjpegServer};
//!
//! # async fn run() -> mjpeg_rs::Result<()> {
//! let ctx = Context::new(Config::default())?;
//! let camera = ReplayCamera::open("frames")?;
//! let _capture = spawn_capture(ctx.clone(), camera)?;
//!
//! MjpegServer::new(ctx).run().await
//! # }
//! ```

pub mod alloc;
pub mod camera;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod pacing;
pub mod pool;
pub mod protocol;
pub mod restart;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;

pub use capture::{spawn_capture, CaptureHandle, CaptureState};
pub use config::Config;
pub use context::Context;
pub use error::{Error, Result};
pub use pool::{FramePool, Strategy};
pub use restart::{ProcessRestart, RestartHook};
pub use server::{Admission, Dispatcher, MjpegServer, ServerConfig};
