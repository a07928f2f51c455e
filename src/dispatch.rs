// ABOUTME: Parallel dispatch of one command across every host in a batch.
// ABOUTME: One task per host, a bounded result channel, and a single deadline for the batch.

use crate::host::{Batch, ResolvedHost};
use crate::session::Connector;
use crate::ssh::{CommandOutput, SshConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Capacity of the channel carrying results back from host tasks.
pub const RESULT_CHANNEL_CAPACITY: usize = 10;

/// What one host produced for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub user: String,
    /// Host as written by the user, port included when not the default.
    pub endpoint: String,
    pub command: String,
    /// Captured output, or the error description in its place.
    pub outcome: Result<CommandOutput, String>,
}

impl CommandResult {
    pub fn new(
        host: &ResolvedHost,
        command: impl Into<String>,
        outcome: crate::ssh::Result<CommandOutput>,
    ) -> Self {
        Self {
            user: host.user().to_string(),
            endpoint: host.endpoint(),
            command: command.into(),
            outcome: outcome.map_err(|e| e.to_string()),
        }
    }

    /// `user@endpoint`.
    pub fn host(&self) -> String {
        format!("{}@{}", self.user, self.endpoint)
    }

    /// Captured text, or the error description.
    pub fn text(&self) -> String {
        match &self.outcome {
            Ok(output) => output.text(),
            Err(e) => e.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn exit_code(&self) -> Option<u32> {
        self.outcome.as_ref().ok().map(|output| output.exit_code)
    }
}

/// Receives results as they arrive.
pub trait Presenter {
    fn present(&mut self, result: &CommandResult);

    /// The deadline passed with `pending` hosts still unreported.
    fn timed_out(&mut self, pending: usize, timeout: Duration);
}

/// Outcome of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Results in arrival order.
    pub results: Vec<CommandResult>,
    /// Number of hosts the command was sent to.
    pub expected: usize,
    pub timed_out: bool,
}

impl DispatchReport {
    /// Hosts that never reported before the wait ended.
    pub fn pending(&self) -> usize {
        self.expected - self.results.len()
    }
}

/// Runs commands across a batch through a connector.
#[derive(Clone)]
pub struct Dispatcher {
    connector: Arc<dyn Connector>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(SshConnector)
    }
}

impl Dispatcher {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }

    /// Run `command` on every host of `batch` concurrently.
    ///
    /// The batch timeout is one deadline for the whole dispatch. When it
    /// passes, waiting stops at once: tasks still running are abandoned, not
    /// cancelled, and whatever they produce later is dropped.
    pub async fn dispatch(
        &self,
        batch: &Batch,
        command: &str,
        presenter: &mut dyn Presenter,
    ) -> DispatchReport {
        let timeout = batch.timeout();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let expected = batch.len();
        let (tx, mut rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

        for host in batch.hosts() {
            let host = Arc::clone(host);
            let connector = Arc::clone(&self.connector);
            let command = command.to_string();
            let tx = tx.clone();

            tokio::spawn(async move {
                let outcome = host.execute(connector.as_ref(), &command).await;
                let result = CommandResult::new(&host, command, outcome);
                if tx.send(result).await.is_err() {
                    tracing::debug!(host = %host, "result arrived after the wait ended, dropped");
                }
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        let mut timed_out = false;

        while results.len() < expected {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(result) => {
                        presenter.present(&result);
                        results.push(result);
                    }
                    // Every sender is gone: a host task died without reporting.
                    None => break,
                },
                _ = &mut deadline => {
                    timed_out = true;
                    presenter.timed_out(expected - results.len(), timeout);
                    break;
                }
            }
        }

        tracing::debug!(
            command,
            expected,
            received = results.len(),
            timed_out,
            "dispatch finished"
        );

        DispatchReport {
            results,
            expected,
            timed_out,
        }
    }
}
