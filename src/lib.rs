// ABOUTME: Library root for commandcast - resolve a batch, dispatch commands, close sessions.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod output;
pub mod session;
pub mod ssh;
