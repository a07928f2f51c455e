// ABOUTME: Configuration sources: settings file, host lists and the SSH alias config.
// ABOUTME: Also provides home-directory and tilde expansion helpers.

mod hosts;
mod settings;
mod ssh_config;

pub use hosts::{parse_host_file, read_host_file, select_host_tokens, split_host_list};
pub use settings::{
    DEFAULT_HOST, DEFAULT_KEY_FILES, DEFAULT_SSH_CONFIG, DEFAULT_TIMEOUT, SETTINGS_FILENAME,
    SETTINGS_FILENAME_ALT, Settings, USER_SETTINGS_PATH,
};
pub use ssh_config::{AliasSource, HostAlias, SshConfig};

use std::path::{Path, PathBuf};

/// The user's home directory from $HOME.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~/` against `home`. Paths without it are returned as-is.
pub fn expand_tilde(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if path == "~" => home.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    }
}
