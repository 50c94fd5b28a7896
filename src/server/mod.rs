//! HTTP front end and client admission
//!
//! ```text
//!   accept ─► read request head ─┬─ GET <stream_path> ─► Dispatcher::admit ─► Session
//!                                └─ anything else ────► "Server is running!"
//! ```

pub mod config;
pub mod dispatch;
pub mod http;
pub mod listener;

pub use config::ServerConfig;
pub use dispatch::{Admission, Dispatcher};
pub use http::RequestHead;
pub use listener::MjpegServer;
