// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, authentication, and command execution.

use super::auth::{AuthMethod, AuthMethods};
use super::error::{Error, Result};
use crate::host::ResolvedHost;
use crate::session::{Connector, RemoteSession};
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKeyWithHashAlg, ssh_key};
use russh::{ChannelMsg, Disconnect, Sig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Keepalive interval for idle sessions kept open between commands.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Methods offered to the server, in order.
    pub auth: AuthMethods,
    /// Bound on TCP connect plus key exchange.
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, auth: AuthMethods) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            auth,
            connect_timeout: Duration::from_secs(15),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        crate::host::format_address(&self.host, self.port)
    }
}

impl From<&ResolvedHost> for SessionConfig {
    fn from(host: &ResolvedHost) -> Self {
        SessionConfig::new(host.hostname(), host.user(), host.auth_methods().clone())
            .port(host.port())
            .connect_timeout(host.timeout())
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Signal that killed the command, if it did not exit on its own.
    pub signal: Option<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.signal.is_none()
    }

    /// Captured text: stdout followed by stderr.
    pub fn text(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    address: String,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::debug!(
            address = %self.address,
            algorithm = %server_public_key.algorithm().as_str(),
            "accepting server host key"
        );
        Ok(true)
    }
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let russh_config = Config {
            inactivity_timeout: None,
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            ..Default::default()
        };

        let handler = SshHandler {
            address: config.address(),
        };

        let connect = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        );

        let mut handle = match tokio::time::timeout(config.connect_timeout, connect).await {
            Ok(result) => result.map_err(|e| {
                if e.to_string().contains("Connection refused") {
                    Error::Connection(format!("connection refused to {}", config.address()))
                } else {
                    Error::Connection(e.to_string())
                }
            })?,
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    address: config.address(),
                    timeout: config.connect_timeout,
                });
            }
        };

        Self::authenticate(&mut handle, &config).await?;
        tracing::debug!(
            user = %config.user,
            address = %config.address(),
            "session established"
        );

        Ok(Self { config, handle })
    }

    /// Offer each method in order until the server accepts one.
    async fn authenticate(handle: &mut Handle<SshHandler>, config: &SessionConfig) -> Result<()> {
        for method in config.auth.iter() {
            let attempt = match method {
                AuthMethod::Agent { socket } => {
                    Self::authenticate_with_agent(handle, &config.user, socket).await
                }
                AuthMethod::KeyFile { key, .. } => {
                    Self::authenticate_with_key(handle, &config.user, Arc::clone(key)).await
                }
                AuthMethod::Password(password) => handle
                    .authenticate_password(config.user.as_str(), password.as_str())
                    .await
                    .map(|result| result.success())
                    .map_err(Error::Protocol),
            };

            match attempt {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    tracing::debug!(method = %method, address = %config.address(), "rejected");
                }
                Err(e) => {
                    tracing::debug!(
                        method = %method,
                        address = %config.address(),
                        error = %e,
                        "auth attempt failed"
                    );
                }
            }
        }

        Err(Error::AuthenticationFailed {
            user: config.user.clone(),
            address: config.address(),
        })
    }

    async fn authenticate_with_agent(
        handle: &mut Handle<SshHandler>,
        user: &str,
        socket: &Path,
    ) -> Result<bool> {
        let mut agent = AgentClient::connect_uds(socket).await?;
        let identities = agent.request_identities().await?;
        let hash_alg = handle.best_supported_rsa_hash().await?.flatten();

        for identity in identities {
            match handle
                .authenticate_publickey_with(user, identity, hash_alg, &mut agent)
                .await
            {
                Ok(result) if result.success() => return Ok(true),
                _ => continue,
            }
        }
        Ok(false)
    }

    async fn authenticate_with_key(
        handle: &mut Handle<SshHandler>,
        user: &str,
        key: Arc<ssh_key::PrivateKey>,
    ) -> Result<bool> {
        let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
        let result = handle
            .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
            .await?;
        Ok(result.success())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut collector = ExecCollector::default();
        while let Some(msg) = channel.wait().await {
            if collector.accept(msg) {
                break;
            }
        }
        collector.finish()
    }

    /// Disconnect the session. Channels still open are closed with it.
    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for Session {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Session::exec(self, command).await
    }

    async fn close(&self) -> Result<()> {
        self.disconnect().await
    }
}

/// Accumulates the messages of one exec channel.
#[derive(Debug, Default)]
struct ExecCollector {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
    signal: Option<Sig>,
    eof: bool,
}

impl ExecCollector {
    /// Take one message. Returns true once the command is complete.
    fn accept(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 {
                    self.stderr.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                self.exit_status = Some(exit_status);
                return self.eof;
            }
            ChannelMsg::ExitSignal {
                signal_name,
                core_dumped,
                ..
            } => {
                tracing::debug!(signal = ?signal_name, core_dumped, "remote command killed");
                self.signal = Some(signal_name);
                return self.eof;
            }
            ChannelMsg::Eof => {
                self.eof = true;
                return self.exit_status.is_some() || self.signal.is_some();
            }
            ChannelMsg::Close => return true,
            _ => {}
        }
        false
    }

    fn finish(self) -> Result<CommandOutput> {
        let (exit_code, signal) = match (self.exit_status, self.signal) {
            (Some(code), signal) => (code, signal.as_ref().map(signal_name)),
            (None, Some(sig)) => (128 + signal_number(&sig), Some(signal_name(&sig))),
            // No exit status means the transport gave up under us.
            (None, None) => return Err(Error::ChannelClosed),
        };

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&self.stdout).to_string(),
            stderr: String::from_utf8_lossy(&self.stderr).to_string(),
            signal,
        })
    }
}

fn signal_name(sig: &Sig) -> String {
    match sig {
        Sig::ABRT => "ABRT",
        Sig::ALRM => "ALRM",
        Sig::FPE => "FPE",
        Sig::HUP => "HUP",
        Sig::ILL => "ILL",
        Sig::INT => "INT",
        Sig::KILL => "KILL",
        Sig::PIPE => "PIPE",
        Sig::QUIT => "QUIT",
        Sig::SEGV => "SEGV",
        Sig::TERM => "TERM",
        Sig::USR1 => "USR1",
        Sig::Custom(name) => name.as_str(),
    }
    .to_string()
}

/// POSIX number for the signal, 0 when it has none.
fn signal_number(sig: &Sig) -> u32 {
    match sig {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        Sig::Custom(_) => 0,
    }
}

/// Opens real SSH sessions for resolved hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, host: &ResolvedHost) -> Result<Arc<dyn RemoteSession>> {
        let session = Session::connect(SessionConfig::from(host)).await?;
        Ok(Arc::new(session))
    }
}
