// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Resolves credentials and runs commands over russh sessions.

mod auth;
mod client;
mod error;

pub use auth::{
    AGENT_SOCKET_ENV, AuthMethod, AuthMethods, CredentialSources, agent_socket_from_env,
};
pub use client::{CommandOutput, Session, SessionConfig, SshConnector};
pub use error::{Error, Result};
