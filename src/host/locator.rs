// ABOUTME: Host token parsing for the `[user[:password]@]host[:port]` form.
// ABOUTME: Tokens are read as the authority of an ssh:// URL.

use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("invalid host token '{token}': {reason}")]
    Invalid { token: String, reason: String },

    #[error("host token '{0}' has no host")]
    MissingHost(String),
}

/// The parts of one host token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub user: Option<String>,
    pub password: Option<String>,
    /// Host name or IP address, without IPv6 brackets.
    pub host: String,
    pub port: Option<u16>,
}

impl Locator {
    pub fn parse(token: &str) -> Result<Self, LocatorError> {
        let url = Url::parse(&format!("ssh://{token}")).map_err(|e| LocatorError::Invalid {
            token: token.to_string(),
            reason: e.to_string(),
        })?;

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => String::new(),
        };
        if host.is_empty() {
            return Err(LocatorError::MissingHost(token.to_string()));
        }

        let user = Some(url.username())
            .filter(|user| !user.is_empty())
            .and_then(|user| decode_component(user, "user"));
        let password = url
            .password()
            .and_then(|password| decode_component(password, "password"));

        Ok(Self {
            user,
            password,
            host,
            port: url.port(),
        })
    }

    /// Rewrite `token` with its host part replaced, keeping user info and port.
    pub fn replace_host(token: &str, host: &str) -> String {
        let (userinfo, authority) = match token.rfind('@') {
            Some(at) => (&token[..=at], &token[at + 1..]),
            None => ("", token),
        };

        let port = authority
            .rsplit_once(':')
            .filter(|(head, port)| {
                !head.ends_with(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
            })
            .map(|(_, port)| port);

        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };

        match port {
            Some(port) => format!("{userinfo}{host}:{port}"),
            None => format!("{userinfo}{host}"),
        }
    }
}

/// Percent-decode a user info component. Undecodable values are dropped.
fn decode_component(raw: &str, what: &str) -> Option<String> {
    match urlencoding::decode(raw) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(e) => {
            tracing::debug!(component = what, error = %e, "ignoring undecodable user info");
            None
        }
    }
}
