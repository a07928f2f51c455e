// ABOUTME: Run settings merged from an optional YAML file and command-line flags.
// ABOUTME: Supplies defaults for user, key files, timeout, hosts and the alias config path.

use super::expand_tilde;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILENAME: &str = "commandcast.yml";
pub const SETTINGS_FILENAME_ALT: &str = "commandcast.yaml";
/// Per-user settings file, relative to $HOME.
pub const USER_SETTINGS_PATH: &str = ".config/commandcast/config.yml";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_KEY_FILES: [&str; 3] = ["~/.ssh/id_ed25519", "~/.ssh/id_dsa", "~/.ssh/id_rsa"];
pub const DEFAULT_SSH_CONFIG: &str = "~/.ssh/config";
const FALLBACK_USER: &str = "root";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub keys: Option<Vec<String>>,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub hosts: Option<Vec<String>>,

    #[serde(default)]
    pub hostfile: Option<PathBuf>,

    #[serde(default)]
    pub ssh_config: Option<PathBuf>,
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First settings file found in `dir`, then in the user's config directory.
    pub fn discover(dir: &Path, home: Option<&Path>) -> Result<Option<Self>> {
        let mut candidates = vec![dir.join(SETTINGS_FILENAME), dir.join(SETTINGS_FILENAME_ALT)];
        if let Some(home) = home {
            candidates.push(home.join(USER_SETTINGS_PATH));
        }

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading settings");
                return Self::load(path).map(Some);
            }
        }

        Ok(None)
    }

    /// Load `explicit` if given (it must exist), otherwise discover.
    pub fn locate(
        explicit: Option<&Path>,
        dir: &Path,
        home: Option<&Path>,
    ) -> Result<Option<Self>> {
        match explicit {
            Some(path) if path.exists() => Self::load(path).map(Some),
            Some(path) => Err(Error::ConfigNotFound(path.to_path_buf())),
            None => Self::discover(dir, home),
        }
    }

    /// Fields set in `self` win; unset ones are taken from `base`.
    pub fn overlay(self, base: Settings) -> Settings {
        Settings {
            user: self.user.or(base.user),
            keys: self.keys.or(base.keys),
            timeout: self.timeout.or(base.timeout),
            hosts: self.hosts.or(base.hosts),
            hostfile: self.hostfile.or(base.hostfile),
            ssh_config: self.ssh_config.or(base.ssh_config),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig("timeout must be greater than zero".to_string()));
        }
        if matches!(&self.user, Some(user) if user.trim().is_empty()) {
            return Err(Error::InvalidConfig("user cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Configured user, else $USER, else root.
    pub fn user(&self) -> String {
        self.user
            .clone()
            .or_else(|| std::env::var("USER").ok().filter(|user| !user.is_empty()))
            .unwrap_or_else(|| FALLBACK_USER.to_string())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Candidate private key files with `~/` expanded.
    pub fn key_paths(&self, home: Option<&Path>) -> Vec<PathBuf> {
        match &self.keys {
            Some(keys) => keys.iter().map(|key| expand_tilde(key, home)).collect(),
            None => DEFAULT_KEY_FILES
                .iter()
                .map(|key| expand_tilde(key, home))
                .collect(),
        }
    }

    pub fn host_list(&self) -> Vec<String> {
        self.hosts
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_HOST.to_string()])
    }

    pub fn ssh_config_path(&self, home: Option<&Path>) -> PathBuf {
        match &self.ssh_config {
            Some(path) => expand_tilde(&path.to_string_lossy(), home),
            None => expand_tilde(DEFAULT_SSH_CONFIG, home),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_home() {
        let settings = Settings::default();
        let home = Path::new("/home/alice");

        assert_eq!(settings.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(settings.host_list(), vec!["localhost"]);
        assert_eq!(
            settings.key_paths(Some(home)),
            vec![
                PathBuf::from("/home/alice/.ssh/id_ed25519"),
                PathBuf::from("/home/alice/.ssh/id_dsa"),
                PathBuf::from("/home/alice/.ssh/id_rsa"),
            ]
        );
        assert_eq!(
            settings.ssh_config_path(Some(home)),
            PathBuf::from("/home/alice/.ssh/config")
        );
    }

    #[test]
    fn user_falls_back_to_environment_then_root() {
        temp_env::with_var("USER", Some("carol"), || {
            assert_eq!(Settings::default().user(), "carol");
        });
        temp_env::with_var_unset("USER", || {
            assert_eq!(Settings::default().user(), "root");
        });
    }

    #[test]
    fn overlay_prefers_self() {
        let flags = Settings {
            user: Some("flag-user".to_string()),
            ..Default::default()
        };
        let file = Settings {
            user: Some("file-user".to_string()),
            timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };

        let merged = flags.overlay(file);
        assert_eq!(merged.user.as_deref(), Some("flag-user"));
        assert_eq!(merged.timeout(), Duration::from_secs(3));
    }
}
