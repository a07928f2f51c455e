// ABOUTME: Test support utilities.
// ABOUTME: Provides an in-memory connector, a recording presenter and tracing setup.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use async_trait::async_trait;
use commandcast::dispatch::{CommandResult, Presenter};
use commandcast::host::{HostResolver, ResolvedHost};
use commandcast::session::{Connector, RemoteSession};
use commandcast::ssh::{self, AuthMethod, AuthMethods, CommandOutput};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("commandcast=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Path of the Ed25519 key fixture.
pub fn fixture_key() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/id_ed25519")
}

pub fn password_auth() -> AuthMethods {
    AuthMethods::new(AuthMethod::Password("global-secret".to_string()))
}

pub fn resolver(default_user: &str, timeout: Duration) -> HostResolver {
    HostResolver::new(default_user, timeout, password_auth())
}

#[derive(Default)]
struct FakeState {
    delays: Mutex<HashMap<String, Duration>>,
    hangs: Mutex<HashSet<(String, String)>>,
    refusals: Mutex<HashMap<String, usize>>,
    broken: Mutex<HashSet<String>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// Connector whose sessions answer `<endpoint>-ok` to every command.
///
/// Hosts are keyed by endpoint (`host` or `host:port`).
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands on `endpoint` take `delay` to answer.
    pub fn delay(self, endpoint: &str, delay: Duration) -> Self {
        self.state
            .delays
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), delay);
        self
    }

    /// `command` on `endpoint` never finishes; other commands there answer normally.
    pub fn hang(self, endpoint: &str, command: &str) -> Self {
        self.state
            .hangs
            .lock()
            .unwrap()
            .insert((endpoint.to_string(), command.to_string()));
        self
    }

    /// The next `times` connects to `endpoint` are refused.
    pub fn refuse(self, endpoint: &str, times: usize) -> Self {
        self.state
            .refusals
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), times);
        self
    }

    /// Every exec on `endpoint` fails as if the channel died.
    pub fn break_exec(self, endpoint: &str) -> Self {
        self.state
            .broken
            .lock()
            .unwrap()
            .insert(endpoint.to_string());
        self
    }

    /// Successful connects so far.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, host: &ResolvedHost) -> ssh::Result<Arc<dyn RemoteSession>> {
        let endpoint = host.endpoint();

        if let Some(remaining) = self.state.refusals.lock().unwrap().get_mut(&endpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ssh::Error::Connection(format!(
                    "connection refused to {}",
                    host.address()
                )));
            }
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.delays.lock().unwrap().get(&endpoint).copied();
        let broken = self.state.broken.lock().unwrap().contains(&endpoint);

        Ok(Arc::new(FakeSession {
            endpoint,
            delay,
            broken,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    endpoint: String,
    delay: Option<Duration>,
    broken: bool,
    state: Arc<FakeState>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        let hangs = self
            .state
            .hangs
            .lock()
            .unwrap()
            .contains(&(self.endpoint.clone(), command.to_string()));
        if hangs {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.broken {
            return Err(ssh::Error::ChannelClosed);
        }
        Ok(CommandOutput {
            exit_code: 0,
            stdout: format!("{}-ok", self.endpoint),
            ..Default::default()
        })
    }

    async fn close(&self) -> ssh::Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Presenter that keeps everything it is shown.
#[derive(Default)]
pub struct Recorder {
    pub results: Vec<CommandResult>,
    pub timeouts: Vec<usize>,
}

impl Presenter for Recorder {
    fn present(&mut self, result: &CommandResult) {
        self.results.push(result.clone());
    }

    fn timed_out(&mut self, pending: usize, _timeout: Duration) {
        self.timeouts.push(pending);
    }
}
