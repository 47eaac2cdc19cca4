//! Simulated session.
//!
//! Wires a [`Runtime`] to [`SimEnv`] and [`SimTransport`] and spawns it on
//! the current tokio runtime. Intended for `#[tokio::test(start_paused =
//! true)]` tests, where the runtime task only advances when the test yields.

use tidings_app::{Runtime, SessionHandle};
use tidings_client::ClientConfig;
use tokio::task::JoinHandle;

use crate::{SessionTrace, SimEnv, SimTransport};

/// Yields granted to spawned tasks by [`SimSession::settle`].
const SETTLE_YIELDS: usize = 32;

/// A running session under simulation.
pub struct SimSession {
    /// Handle to the running session
    pub handle: SessionHandle,
    /// Transport shared with the runtime
    pub transport: SimTransport,
    /// Environment shared with the runtime
    pub env: SimEnv,
    trace: SessionTrace,
    task: JoinHandle<()>,
}

impl SimSession {
    /// Spawn a session for `config` with seed 0.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    pub fn spawn(config: &ClientConfig) -> Self {
        Self::spawn_with_seed(config, 0)
    }

    /// Spawn a session for `config` with a seeded environment.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[allow(clippy::expect_used)]
    pub fn spawn_with_seed(config: &ClientConfig, seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        let transport = SimTransport::new();

        let (runtime, handle) = Runtime::new(config, env.clone(), transport.clone())
            .expect("simulated session config is valid");
        let task = tokio::spawn(runtime.run());

        Self {
            handle,
            transport,
            env,
            trace: SessionTrace::new(config.max_reconnect_attempts),
            task,
        }
    }

    /// Let spawned tasks (the runtime loop, expired timers) run until they
    /// block. Does not advance the clock.
    pub async fn settle(&self) {
        for _ in 0..SETTLE_YIELDS {
            tokio::task::yield_now().await;
        }
    }

    /// Start the session, accept the connection it opens and wait for the
    /// runtime to process the handshake. Returns the connection index.
    ///
    /// # Panics
    ///
    /// Panics if the session cannot be started.
    #[allow(clippy::expect_used)]
    pub async fn connect(&self) -> usize {
        self.handle.start().await.expect("session starts");
        self.accept_latest().await
    }

    /// Accept the most recently opened connection and settle. Returns its
    /// index.
    ///
    /// # Panics
    ///
    /// Panics if no connection has been opened.
    #[allow(clippy::expect_used)]
    pub async fn accept_latest(&self) -> usize {
        let index =
            self.transport.connection_count().checked_sub(1).expect("a connection was opened");
        self.transport.accept(index).await;
        self.settle().await;
        index
    }

    /// Record the current snapshot for invariant checking.
    pub fn observe(&mut self) {
        self.trace.record(self.handle.snapshot().as_ref().clone());
    }

    /// Snapshots recorded so far.
    pub fn trace(&self) -> &SessionTrace {
        &self.trace
    }

    /// Shut the runtime down and wait for it to exit.
    pub async fn finish(self) {
        // Already stopped is fine
        let _ = self.handle.shutdown().await;
        let _ = self.task.await;
    }
}
