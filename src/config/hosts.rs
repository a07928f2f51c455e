// ABOUTME: Host list sources: comma-separated lists and newline-delimited host files.
// ABOUTME: A readable, non-empty host file replaces the list entirely.

use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use std::path::Path;

/// Split a comma-separated host list, trimming pieces and skipping empty ones.
pub fn split_host_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

/// One token per line; blank lines and `#` comments are skipped.
pub fn parse_host_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_host_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_host_file(&content))
}

/// Pick the host tokens for a run.
///
/// The host file wins when it can be read and names at least one host.
/// Otherwise the list is used; an unreadable file is recorded as a warning.
pub fn select_host_tokens(
    hostfile: Option<&Path>,
    list: Vec<String>,
    diag: &mut Diagnostics,
) -> Vec<String> {
    let Some(path) = hostfile else {
        return list;
    };

    match read_host_file(path) {
        Ok(hosts) if !hosts.is_empty() => hosts,
        Ok(_) => {
            tracing::debug!(path = %path.display(), "host file is empty, using host list");
            list
        }
        Err(e) => {
            diag.warn(Warning::host_file(format!(
                "{}: {}; using host list",
                path.display(),
                e
            )));
            list
        }
    }
}
