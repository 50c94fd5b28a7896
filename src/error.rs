//! Error types
//!
//! Failures are handled where they are detected. Most of them are local:
//! a camera read fails and the cycle is skipped, a client goes away and its
//! session ends. The one exception is running out of memory under the
//! fail-fast policy, which the detecting task hands to the restart path.

use std::io;

use thiserror::Error;

use crate::alloc::Placement;
use crate::camera::CameraError;

/// Result type alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be parsed or is inconsistent
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No pool could satisfy an allocation under the fail-fast policy
    #[error("out of memory: {size} bytes ({placement:?})")]
    OutOfMemory { size: usize, placement: Placement },

    /// A session's private frame copy could not be grown
    #[error("no memory for a {size} byte session buffer")]
    BufferUnavailable { size: usize },

    /// The camera failed to deliver a frame
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),

    /// The client transport is gone or timed out
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config(reason.into())
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Error::Transport(reason.into())
    }

    /// Whether the device must restart to recover from this error.
    pub fn is_device_fatal(&self) -> bool {
        matches!(self, Error::OutOfMemory { .. })
    }

    /// Whether the failing operation can simply be retried on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Camera(_))
    }
}
