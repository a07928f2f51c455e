// ABOUTME: Host alias lookup from OpenSSH-style config files.
// ABOUTME: Understands Host blocks with HostName, User and Port; other keywords are ignored.

use crate::error::{Error, Result};
use std::path::Path;

/// Substitutions an alias source offers for one host token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAlias {
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
}

/// Maps short host names to real host names and users.
pub trait AliasSource: Send + Sync {
    fn lookup(&self, alias: &str) -> HostAlias;
}

#[derive(Debug, Clone, Default)]
struct HostBlock {
    patterns: Vec<String>,
    hostname: Option<String>,
    user: Option<String>,
    port: Option<u16>,
}

impl HostBlock {
    fn matches(&self, alias: &str) -> bool {
        let alias = alias.to_ascii_lowercase();
        let mut matched = false;
        for pattern in &self.patterns {
            let pattern = pattern.to_ascii_lowercase();
            if let Some(negated) = pattern.strip_prefix('!') {
                if wildcard_match(negated, &alias) {
                    return false;
                }
            } else if wildcard_match(&pattern, &alias) {
                matched = true;
            }
        }
        matched
    }
}

/// Parsed alias configuration.
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

impl SshConfig {
    pub fn parse(content: &str) -> Result<Self> {
        // Options before the first Host line apply to every host.
        let mut blocks = vec![HostBlock {
            patterns: vec!["*".to_string()],
            ..Default::default()
        }];

        for (index, raw) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (keyword, args) = split_option(line);
            if keyword.is_empty() {
                continue;
            }

            let block = match keyword.as_str() {
                "host" => {
                    if args.is_empty() {
                        return Err(Error::SshConfig {
                            line: line_number,
                            message: "Host requires at least one pattern".to_string(),
                        });
                    }
                    blocks.push(HostBlock {
                        patterns: args.iter().map(|s| s.to_string()).collect(),
                        ..Default::default()
                    });
                    continue;
                }
                "match" => {
                    tracing::debug!(line = line_number, "Match blocks are not supported, skipping");
                    blocks.push(HostBlock::default());
                    continue;
                }
                _ => match blocks.last_mut() {
                    Some(block) => block,
                    None => continue,
                },
            };

            let value = || {
                args.first().map(|s| s.to_string()).ok_or_else(|| Error::SshConfig {
                    line: line_number,
                    message: format!("{keyword} requires a value"),
                })
            };

            match keyword.as_str() {
                "hostname" => {
                    block.hostname.get_or_insert(value()?);
                }
                "user" => {
                    block.user.get_or_insert(value()?);
                }
                "port" => {
                    let raw = value()?;
                    let port = raw.parse::<u16>().map_err(|_| Error::SshConfig {
                        line: line_number,
                        message: format!("invalid port: {raw}"),
                    })?;
                    block.port.get_or_insert(port);
                }
                other => {
                    tracing::trace!(keyword = other, line = line_number, "ignoring option");
                }
            }
        }

        Ok(Self { blocks })
    }

    /// Load from `path`. A missing file yields None.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl AliasSource for SshConfig {
    /// First matching block to set a keyword wins, as in OpenSSH.
    fn lookup(&self, alias: &str) -> HostAlias {
        let mut found = HostAlias::default();

        for block in self.blocks.iter().filter(|block| block.matches(alias)) {
            if found.hostname.is_none() {
                found.hostname = block.hostname.as_ref().map(|h| h.replace("%h", alias));
            }
            if found.user.is_none() {
                found.user = block.user.clone();
            }
            if found.port.is_none() {
                found.port = block.port;
            }
        }

        found
    }
}

/// Split `Keyword value...` or `Keyword=value` into a lowercase keyword and its arguments.
fn split_option(line: &str) -> (String, Vec<&str>) {
    let (keyword, rest) = match line.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    };
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    let args = rest
        .split_whitespace()
        .map(|arg| arg.trim_matches('"'))
        .filter(|arg| !arg.is_empty())
        .collect();
    (keyword.to_ascii_lowercase(), args)
}

/// Glob match supporting `*` and `?`.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("web-*", "web-01"));
        assert!(wildcard_match("db?", "db1"));
        assert!(!wildcard_match("db?", "db10"));
        assert!(wildcard_match("*.example.com", "a.example.com"));
        assert!(!wildcard_match("*.example.com", "example.org"));
    }

    #[test]
    fn split_accepts_both_syntaxes() {
        assert_eq!(
            split_option("HostName  web.internal"),
            ("hostname".to_string(), vec!["web.internal"])
        );
        assert_eq!(split_option("User=deploy"), ("user".to_string(), vec!["deploy"]));
        assert_eq!(split_option("Port = 2222"), ("port".to_string(), vec!["2222"]));
    }

    #[test]
    fn negated_pattern_excludes() {
        let config = SshConfig::parse("Host * !bastion\n  User ops\n").unwrap();
        assert_eq!(config.lookup("web").user.as_deref(), Some("ops"));
        assert_eq!(config.lookup("bastion").user, None);
    }

    #[test]
    fn hostname_token_expands() {
        let config = SshConfig::parse("Host *\n  HostName %h.internal\n").unwrap();
        assert_eq!(config.lookup("web").hostname.as_deref(), Some("web.internal"));
    }

    #[test]
    fn host_without_pattern_is_an_error() {
        let err = SshConfig::parse("Host\n").unwrap_err();
        assert!(matches!(err, Error::SshConfig { line: 1, .. }));
    }
}
