// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, and remote command failures.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("authentication failed for {user}@{address}: no method accepted")]
    AuthenticationFailed { user: String, address: String },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the session that produced this error can no longer be reused.
    pub fn breaks_session(&self) -> bool {
        matches!(
            self,
            Error::ChannelClosed | Error::CommandFailed(_) | Error::Protocol(_) | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_break_the_session() {
        assert!(Error::ChannelClosed.breaks_session());
        assert!(Error::CommandFailed("failed to open channel".into()).breaks_session());
        assert!(!Error::Connection("refused".into()).breaks_session());
    }
}
