//! HTTP API module.
//!
//! HTTP server, request/response types and the process log broadcaster.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
