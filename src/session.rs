// ABOUTME: Per-host session lifecycle: lazy connect, one channel per command, explicit close.
// ABOUTME: Defines the Connector/RemoteSession seam between dispatching and the SSH transport.

use crate::host::ResolvedHost;
use crate::ssh::{CommandOutput, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Opens an authenticated session to a resolved host.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &ResolvedHost) -> Result<Arc<dyn RemoteSession>>;
}

/// An open session. Each command runs on its own channel, so several
/// commands may be in flight on one session at once.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run one command and wait for it to finish.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Tear down the underlying connection.
    async fn close(&self) -> Result<()>;
}

/// The lazily opened session owned by one host.
///
/// The slot is only locked while connecting or swapping the session, never
/// across a remote command. A command abandoned by an earlier dispatch keeps
/// running on its own channel without holding up later ones.
#[derive(Default)]
pub struct HostSession {
    slot: Mutex<Option<Arc<dyn RemoteSession>>>,
}

impl std::fmt::Debug for HostSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.slot.try_lock() {
            Ok(slot) if slot.is_some() => "open",
            Ok(_) => "closed",
            Err(_) => "connecting",
        };
        f.debug_struct("HostSession").field("state", &state).finish()
    }
}

impl HostSession {
    /// Run `command` on `host`, connecting first if no session is open.
    ///
    /// A failed connect leaves the slot empty, so the next call starts over.
    /// An exec failure that broke the transport also empties the slot.
    pub async fn execute(
        &self,
        connector: &dyn Connector,
        host: &ResolvedHost,
        command: &str,
    ) -> Result<CommandOutput> {
        let session = self.acquire(connector, host).await?;
        let result = session.exec(command).await;

        let broken = match &result {
            Err(e) if e.breaks_session() => {
                tracing::debug!(host = %host, error = %e, "session broken by failed command");
                true
            }
            _ => false,
        };

        if broken {
            let mut slot = self.slot.lock().await;
            // Another command may already have replaced it.
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &session)) {
                *slot = None;
            }
        }

        result
    }

    /// The cached session, connecting under the lock when there is none.
    async fn acquire(
        &self,
        connector: &dyn Connector,
        host: &ResolvedHost,
    ) -> Result<Arc<dyn RemoteSession>> {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        tracing::debug!(host = %host, "connecting");
        let session = connector.connect(host).await?;
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Whether a session is currently cached. A connect in progress is not.
    pub fn is_open(&self) -> bool {
        self.slot
            .try_lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Close the session if one is open. Safe to call any number of times.
    ///
    /// Commands still running on the session are cut off with it.
    pub async fn close(&self) -> Result<()> {
        let session = self.slot.lock().await.take();
        match session {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }
}
