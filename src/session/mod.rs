//! Client sessions
//!
//! One task per connected client, from stream header to teardown.

pub mod state;
pub mod task;

pub use state::{DisconnectReason, SessionPhase, SessionState};
pub use task::Session;
