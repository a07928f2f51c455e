// ABOUTME: Host identity resolution and the batch of resolved hosts.
// ABOUTME: Merges host tokens with alias config, default user and credentials.

mod locator;

pub use locator::{Locator, LocatorError};

use crate::config::AliasSource;
use crate::diagnostics::{Diagnostics, Warning};
use crate::session::{Connector, HostSession};
use crate::ssh::{self, AuthMethods, CommandOutput};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Port used when neither the token nor the alias config names one.
pub const DEFAULT_PORT: u16 = 22;

/// `host:port`, with IPv6 literals bracketed.
pub fn format_address(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// A fully resolved connection target, owning its lazily opened session.
pub struct ResolvedHost {
    user: String,
    hostname: String,
    port: u16,
    timeout: Duration,
    auth: AuthMethods,
    session: HostSession,
}

impl ResolvedHost {
    pub fn new(
        user: impl Into<String>,
        hostname: impl Into<String>,
        port: u16,
        timeout: Duration,
        auth: AuthMethods,
    ) -> Self {
        Self {
            user: user.into(),
            hostname: hostname.into(),
            port,
            timeout,
            auth,
            session: HostSession::default(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connect bound for this host's session.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn auth_methods(&self) -> &AuthMethods {
        &self.auth
    }

    /// Network address, always with a port.
    pub fn address(&self) -> String {
        format_address(&self.hostname, self.port)
    }

    /// Host as a user would write it: the port only when it is not the default.
    pub fn endpoint(&self) -> String {
        if self.port == DEFAULT_PORT {
            if self.hostname.contains(':') {
                format!("[{}]", self.hostname)
            } else {
                self.hostname.clone()
            }
        } else {
            self.address()
        }
    }

    /// Run one command, opening the session on first use.
    pub async fn execute(
        &self,
        connector: &dyn Connector,
        command: &str,
    ) -> ssh::Result<CommandOutput> {
        self.session.execute(connector, self, command).await
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Close the session if open. Idempotent.
    pub async fn close(&self) -> ssh::Result<()> {
        self.session.close().await
    }
}

impl fmt::Display for ResolvedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.endpoint())
    }
}

impl fmt::Debug for ResolvedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHost")
            .field("user", &self.user)
            .field("address", &self.address())
            .field("timeout", &self.timeout)
            .field("auth", &self.auth.kinds())
            .field("session", &self.session)
            .finish()
    }
}

/// Turns raw host tokens into resolved hosts.
pub struct HostResolver {
    default_user: String,
    timeout: Duration,
    auth: AuthMethods,
    aliases: Option<Box<dyn AliasSource>>,
}

impl HostResolver {
    pub fn new(default_user: impl Into<String>, timeout: Duration, auth: AuthMethods) -> Self {
        Self {
            default_user: default_user.into(),
            timeout,
            auth,
            aliases: None,
        }
    }

    /// Consult `source` for host name, user and port substitutions.
    pub fn aliases(mut self, source: impl AliasSource + 'static) -> Self {
        self.aliases = Some(Box::new(source));
        self
    }

    /// Resolve one token. Returns None for tokens that are not valid endpoints.
    ///
    /// Aliases are looked up by the token's host part. Precedence for the
    /// user and port: token, then alias config, then the defaults. An
    /// embedded password adds a password method for this host only.
    pub fn resolve(&self, token: &str) -> Option<ResolvedHost> {
        let token = token.trim();
        let mut locator = parse_token(token)?;
        let mut user = self.default_user.clone();
        let mut alias_port = None;

        if let Some(aliases) = &self.aliases {
            let alias = aliases.lookup(&locator.host);
            if let Some(hostname) = alias.hostname {
                let substituted = parse_token(&Locator::replace_host(token, &hostname))?;
                locator.host = substituted.host;
            }
            if let Some(alias_user) = alias.user {
                user = alias_user;
            }
            alias_port = alias.port;
        }

        if let Some(token_user) = locator.user {
            user = token_user;
        }
        if user.is_empty() {
            tracing::debug!(token, "dropping host token without a user");
            return None;
        }

        let auth = match locator.password {
            Some(password) => self.auth.with_password(password),
            None => self.auth.clone(),
        };
        let port = locator.port.or(alias_port).unwrap_or(DEFAULT_PORT);

        Some(ResolvedHost::new(user, locator.host, port, self.timeout, auth))
    }
}

fn parse_token(token: &str) -> Option<Locator> {
    match Locator::parse(token) {
        Ok(locator) => Some(locator),
        Err(e) => {
            tracing::debug!(token, error = %e, "dropping host token");
            None
        }
    }
}

/// All resolved hosts for one run plus the shared dispatch timeout.
#[derive(Debug)]
pub struct Batch {
    hosts: Vec<Arc<ResolvedHost>>,
    timeout: Duration,
}

impl Batch {
    pub fn new(hosts: Vec<ResolvedHost>, timeout: Duration) -> Self {
        Self {
            hosts: hosts.into_iter().map(Arc::new).collect(),
            timeout,
        }
    }

    /// Resolve every token, silently dropping the invalid ones.
    ///
    /// Duplicates are kept: the same host listed twice runs every command twice.
    pub fn resolve<I, S>(tokens: I, resolver: &HostResolver) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = tokens
            .into_iter()
            .filter_map(|token| resolver.resolve(token.as_ref()))
            .collect();
        Self::new(hosts, resolver.timeout)
    }

    pub fn hosts(&self) -> &[Arc<ResolvedHost>] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Deadline for one whole dispatch.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Close every host's session, recording failures as warnings.
    pub async fn close_all(&self, diag: &mut Diagnostics) {
        for host in &self.hosts {
            match tokio::time::timeout(host.timeout(), host.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => diag.warn(Warning::ssh_disconnect(format!("{host}: {e}"))),
                Err(_) => diag.warn(Warning::ssh_disconnect(format!("{host}: timed out"))),
            }
        }
    }
}
