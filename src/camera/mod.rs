//! Camera interface
//!
//! The camera hands back already-encoded JPEG frames. The returned slice
//! borrows the camera's own buffer and is only valid until the next call,
//! which is why the capture task copies it into the pool before doing
//! anything else.

mod replay;

pub use replay::ReplayCamera;

use thiserror::Error;

/// Camera failures; all of them are retried on the next capture cycle
#[derive(Error, Debug)]
pub enum CameraError {
    /// The sensor did not deliver a frame in time
    #[error("frame capture timed out")]
    Timeout,

    /// The sensor delivered nothing usable
    #[error("empty frame")]
    EmptyFrame,

    /// Device-level failure
    #[error("device error: {0}")]
    Device(String),

    /// Reading the frame source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source of encoded frames
pub trait Camera: Send + 'static {
    /// Grab the next frame
    fn capture(&mut self) -> Result<&[u8], CameraError>;
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn capture(&mut self) -> Result<&[u8], CameraError> {
        (**self).capture()
    }
}
