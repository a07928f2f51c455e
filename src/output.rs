// ABOUTME: Output formatting for CLI feedback and per-host results.
// ABOUTME: Supports normal, quiet, and JSON output modes.

use crate::dispatch::{CommandResult, Presenter};
use crate::ssh::CommandOutput;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with a header per host
    Normal,
    /// Captured text only
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a labelled summary line, e.g. the resolved hosts.
    pub fn label(&self, label: &str, items: &[String]) {
        if self.mode == OutputMode::Normal {
            println!("{label}: {}", items.join(", "));
        }
    }

    /// Interactive prompt. Not shown in JSON mode.
    pub fn prompt(&self) {
        if self.mode != OutputMode::Json {
            print!(">>> ");
            let _ = std::io::stdout().flush();
        }
    }

    /// Print a warning message.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit_json(&JsonEvent::Warning { message }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => emit_json(&JsonEvent::Error { message }),
        }
    }
}

impl Presenter for Output {
    fn present(&mut self, result: &CommandResult) {
        match self.mode {
            OutputMode::Normal => println!("{}", format_result(result)),
            OutputMode::Quiet => {
                let text = result.text();
                if !text.is_empty() {
                    print!("{text}");
                    if !text.ends_with('\n') {
                        println!();
                    }
                }
            }
            OutputMode::Json => emit_json(&JsonEvent::from(result)),
        }
    }

    fn timed_out(&mut self, pending: usize, timeout: Duration) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!(
                "Timed out! {pending} host(s) did not answer within {}s",
                timeout.as_secs()
            ),
            OutputMode::Json => emit_json(&JsonEvent::Timeout {
                pending,
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

/// Header line naming the host and command, then the captured text if any.
pub fn format_result(result: &CommandResult) -> String {
    let mut header = format!("{} > {}", result.host(), result.command);
    match &result.outcome {
        Ok(CommandOutput {
            signal: Some(signal),
            ..
        }) => header.push_str(&format!(" [signal {signal}]")),
        Ok(output) if !output.success() => {
            header.push_str(&format!(" [exit {}]", output.exit_code));
        }
        Err(_) => header.push_str(" [error]"),
        Ok(_) => {}
    }

    let text = result.text();
    if text.is_empty() {
        header
    } else {
        format!("{header}\n{}", text.trim_end_matches('\n'))
    }
}

fn emit_json(event: &JsonEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Result {
        host: &'a str,
        user: &'a str,
        command: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        signal: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stdout: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stderr: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    },
    Timeout {
        pending: usize,
        timeout_secs: u64,
    },
    Warning {
        message: &'a str,
    },
    Error {
        message: &'a str,
    },
}

impl<'a> From<&'a CommandResult> for JsonEvent<'a> {
    fn from(result: &'a CommandResult) -> Self {
        let (exit_code, signal, stdout, stderr, error) = match &result.outcome {
            Ok(output) => (
                Some(output.exit_code),
                output.signal.as_deref(),
                Some(output.stdout.as_str()),
                Some(output.stderr.as_str()),
                None,
            ),
            Err(e) => (None, None, None, None, Some(e.as_str())),
        };
        JsonEvent::Result {
            host: &result.endpoint,
            user: &result.user,
            command: &result.command,
            exit_code,
            signal,
            stdout,
            stderr,
            error,
        }
    }
}
