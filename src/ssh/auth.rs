// ABOUTME: Credential resolution for SSH sessions.
// ABOUTME: Builds the ordered set of agent, key-file and password methods offered to servers.

use nonempty::NonEmpty;
use russh::keys::agent::client::AgentClient;
use russh::keys::{load_secret_key, ssh_key};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable holding the agent socket path.
pub const AGENT_SOCKET_ENV: &str = "SSH_AUTH_SOCK";

/// One way of proving identity to a server.
#[derive(Clone)]
pub enum AuthMethod {
    /// Identities held by an SSH agent listening on a Unix socket.
    Agent { socket: PathBuf },
    /// A private key already loaded from disk.
    KeyFile {
        path: PathBuf,
        key: Arc<ssh_key::PrivateKey>,
    },
    Password(String),
}

impl AuthMethod {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMethod::Agent { .. } => "agent",
            AuthMethod::KeyFile { .. } => "publickey",
            AuthMethod::Password(_) => "password",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Agent { socket } => {
                f.debug_struct("Agent").field("socket", socket).finish()
            }
            AuthMethod::KeyFile { path, .. } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("key", &"<private key>")
                .finish(),
            AuthMethod::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Agent { socket } => write!(f, "agent ({})", socket.display()),
            AuthMethod::KeyFile { path, .. } => write!(f, "{}", path.display()),
            AuthMethod::Password(_) => write!(f, "password"),
        }
    }
}

/// Ordered, non-empty list of methods. Servers are offered them front to back.
#[derive(Debug, Clone)]
pub struct AuthMethods(NonEmpty<AuthMethod>);

impl AuthMethods {
    pub fn new(first: AuthMethod) -> Self {
        Self(NonEmpty::new(first))
    }

    /// Returns None when `methods` is empty.
    pub fn from_vec(methods: Vec<AuthMethod>) -> Option<Self> {
        NonEmpty::from_vec(methods).map(Self)
    }

    /// Copy of this set with a password method appended.
    pub fn with_password(&self, password: impl Into<String>) -> Self {
        let mut methods = self.0.clone();
        methods.push(AuthMethod::Password(password.into()));
        Self(methods)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthMethod> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.iter().map(AuthMethod::kind).collect()
    }
}

/// Where credentials may come from for one run.
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    /// Agent socket; None skips the agent entirely.
    pub agent_socket: Option<PathBuf>,
    /// Candidate private key files, tried in order.
    pub key_files: Vec<PathBuf>,
    /// Password given on the command line.
    pub password: Option<String>,
}

impl CredentialSources {
    /// Sources using the agent advertised by the environment.
    pub fn from_env(key_files: Vec<PathBuf>, password: Option<String>) -> Self {
        Self {
            agent_socket: agent_socket_from_env(),
            key_files,
            password,
        }
    }

    /// Build the method set: agent, then readable keys, then password.
    ///
    /// Unreachable agents and unreadable or unparsable key files are skipped
    /// without surfacing an error. Returns None when nothing usable remains,
    /// in which case no connection should be attempted.
    pub async fn resolve(&self) -> Option<AuthMethods> {
        let mut methods = Vec::new();

        if let Some(socket) = &self.agent_socket {
            if probe_agent(socket).await {
                methods.push(AuthMethod::Agent {
                    socket: socket.clone(),
                });
            }
        }

        for path in &self.key_files {
            if let Some(key) = load_key(path) {
                methods.push(AuthMethod::KeyFile {
                    path: path.clone(),
                    key,
                });
            }
        }

        if let Some(password) = &self.password {
            methods.push(AuthMethod::Password(password.clone()));
        }

        AuthMethods::from_vec(methods)
    }
}

/// Agent socket path from the environment, ignoring an empty value.
pub fn agent_socket_from_env() -> Option<PathBuf> {
    std::env::var_os(AGENT_SOCKET_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

async fn probe_agent(socket: &Path) -> bool {
    let mut agent = match AgentClient::connect_uds(socket).await {
        Ok(agent) => agent,
        Err(e) => {
            tracing::debug!(socket = %socket.display(), error = %e, "SSH agent unreachable");
            return false;
        }
    };

    match agent.request_identities().await {
        Ok(identities) => {
            tracing::debug!(
                socket = %socket.display(),
                identities = identities.len(),
                "using SSH agent"
            );
            true
        }
        Err(e) => {
            tracing::debug!(socket = %socket.display(), error = %e, "SSH agent did not answer");
            false
        }
    }
}

fn load_key(path: &Path) -> Option<Arc<ssh_key::PrivateKey>> {
    match load_secret_key(path, None) {
        Ok(key) => Some(Arc::new(key)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "skipping key file");
            None
        }
    }
}
