// ABOUTME: Non-fatal problems met during a run, shown together once it ends.
// ABOUTME: Warnings are logged as they happen and reported grouped by where they came from.

use std::fmt;

/// Where a warning came from. Report order follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningKind {
    /// The host file was unreadable and the host list was used instead.
    HostFile,
    /// The alias config could not be parsed; no aliases were applied.
    SshConfig,
    SshDisconnect,
}

impl WarningKind {
    fn label(self) -> &'static str {
        match self {
            WarningKind::HostFile => "host file",
            WarningKind::SshConfig => "ssh config",
            WarningKind::SshDisconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn host_file(message: impl Into<String>) -> Self {
        Self::new(WarningKind::HostFile, message)
    }

    pub fn ssh_config(message: impl Into<String>) -> Self {
        Self::new(WarningKind::SshConfig, message)
    }

    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self::new(WarningKind::SshDisconnect, message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

/// Collects warnings for the end-of-run report.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = warning.kind.label(), "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Warnings in the order they were recorded.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Report lines grouped by kind, keeping recording order within a kind.
    pub fn report(&self) -> Vec<String> {
        let mut sorted: Vec<&Warning> = self.warnings.iter().collect();
        sorted.sort_by_key(|w| w.kind);
        sorted.into_iter().map(Warning::to_string).collect()
    }
}
