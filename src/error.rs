// ABOUTME: Application-wide error types for commandcast.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no usable authentication method: no SSH agent, readable key file, or password")]
    NoAuthMethods,

    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("SSH config line {line}: {message}")]
    SshConfig { line: usize, message: String },

    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
