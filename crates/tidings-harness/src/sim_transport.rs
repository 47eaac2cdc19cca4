//! Simulated transport.
//!
//! Every `open` becomes a numbered connection that the test drives by hand:
//! accept or fail it, push server frames into it, read what the client wrote
//! and observe whether the client closed it. Connections are numbered from 0
//! in the order the runtime opened them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tidings_app::{Transport, TransportHandle, TransportSink};
use tidings_core::TransportError;
use tidings_proto::InboundEvent;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Frames a simulated connection buffers before the client's writes are
/// dropped.
pub const OUTBOUND_CAPACITY: usize = 64;

struct SimConnection {
    url: String,
    sink: TransportSink,
    outbound: mpsc::Receiver<String>,
    /// Drained from `outbound` but not yet returned by `sent`
    pending: Vec<String>,
    closed_by_client: bool,
}

impl SimConnection {
    fn drain(&mut self) {
        loop {
            match self.outbound.try_recv() {
                Ok(text) => self.pending.push(text),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed_by_client = true;
                    break;
                },
            }
        }
    }
}

/// In-memory [`Transport`] driven by the test.
///
/// Cheap to clone; clones share connections, so a test keeps one clone
/// while the runtime owns another.
#[derive(Clone, Default)]
pub struct SimTransport {
    connections: Arc<Mutex<Vec<SimConnection>>>,
}

impl SimTransport {
    /// Create a transport with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections opened so far.
    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    /// URL connection `index` was opened with.
    ///
    /// # Panics
    ///
    /// Panics if no such connection was opened.
    pub fn url(&self, index: usize) -> String {
        self.with(index, |conn| conn.url.clone())
    }

    /// Complete the handshake of connection `index`.
    pub async fn accept(&self, index: usize) {
        self.sink(index).opened().await;
    }

    /// Deliver a server event on connection `index`.
    ///
    /// # Panics
    ///
    /// Panics if the event cannot be encoded.
    #[allow(clippy::expect_used)]
    pub async fn push(&self, index: usize, event: &InboundEvent) {
        let text = event.encode().expect("simulated server events encode");
        self.push_raw(index, text).await;
    }

    /// Deliver a raw text frame on connection `index`.
    pub async fn push_raw(&self, index: usize, text: impl Into<String>) {
        self.sink(index).frame(text).await;
    }

    /// Close connection `index` from the server side.
    pub async fn close(&self, index: usize, reason: Option<&str>) {
        self.sink(index).closed(reason.map(str::to_string)).await;
    }

    /// Fail connection `index` (before or after the handshake).
    pub async fn fail(&self, index: usize, error: TransportError) {
        self.sink(index).failed(error).await;
    }

    /// Take the frames the client wrote to connection `index` since the last
    /// call.
    pub fn sent(&self, index: usize) -> Vec<String> {
        self.with(index, |conn| {
            conn.drain();
            std::mem::take(&mut conn.pending)
        })
    }

    /// Whether the client closed connection `index`.
    pub fn is_closed(&self, index: usize) -> bool {
        self.with(index, |conn| {
            conn.drain();
            conn.closed_by_client
        })
    }

    /// Number of connections the client has not closed.
    pub fn open_count(&self) -> usize {
        let mut connections = self.lock();
        connections
            .iter_mut()
            .map(|conn| {
                conn.drain();
                !conn.closed_by_client
            })
            .filter(|open| *open)
            .count()
    }

    fn sink(&self, index: usize) -> TransportSink {
        // Cloned out so no lock is held across the send
        self.with(index, |conn| conn.sink.clone())
    }

    #[allow(clippy::panic)]
    fn with<T>(&self, index: usize, f: impl FnOnce(&mut SimConnection) -> T) -> T {
        let mut connections = self.lock();
        let count = connections.len();
        match connections.get_mut(index) {
            Some(conn) => f(conn),
            None => panic!("connection {index} was never opened ({count} opened)"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimConnection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for SimTransport {
    fn open(&mut self, url: &str, sink: TransportSink) -> TransportHandle {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);

        let mut connections = self.lock();
        tracing::trace!(index = connections.len(), generation = %sink.generation(), "sim open");
        connections.push(SimConnection {
            url: url.to_string(),
            sink,
            outbound: rx,
            pending: Vec::new(),
            closed_by_client: false,
        });

        TransportHandle::new(tx)
    }
}
