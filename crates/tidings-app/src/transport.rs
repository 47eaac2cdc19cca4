//! Transport seam.
//!
//! A [`Transport`] opens one duplex text connection per call. It reports
//! what happens on that connection through a [`TransportSink`] tagged with
//! the connection's generation, and accepts outbound frames through the
//! returned [`TransportHandle`]. The runtime never sees sockets.

use tidings_client::{Generation, TimerId, TransportEvent};
use tidings_core::TransportError;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Input to the runtime loop from transports and timers.
#[derive(Debug)]
pub(crate) enum Input {
    Transport { generation: Generation, event: TransportEvent },
    Timer(TimerId),
}

/// Opens duplex text connections.
pub trait Transport: Send + 'static {
    /// Start connecting to `url` and return immediately.
    ///
    /// The connection reports `Opened` or `Failed` through `sink` once the
    /// attempt resolves, then any number of frames, then at most one
    /// `Closed` or `Failed`. Closing the returned handle tears the
    /// connection down; no further events need be reported after that.
    fn open(&mut self, url: &str, sink: TransportSink) -> TransportHandle;
}

/// Where a connection reports its events.
///
/// Sends wait while the runtime's input queue is full. The runtime never
/// waits on a connection, so this cannot stall it.
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: Generation,
    inputs: mpsc::Sender<Input>,
}

impl TransportSink {
    pub(crate) fn new(generation: Generation, inputs: mpsc::Sender<Input>) -> Self {
        Self { generation, inputs }
    }

    /// Generation this sink tags events with.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Report an event. Returns `false` once the runtime has gone away.
    pub async fn send(&self, event: TransportEvent) -> bool {
        self.inputs.send(Input::Transport { generation: self.generation, event }).await.is_ok()
    }

    /// Connection established.
    pub async fn opened(&self) -> bool {
        self.send(TransportEvent::Opened).await
    }

    /// Text frame received.
    pub async fn frame(&self, text: impl Into<String>) -> bool {
        self.send(TransportEvent::Frame(text.into())).await
    }

    /// Connection closed.
    pub async fn closed(&self, reason: Option<String>) -> bool {
        self.send(TransportEvent::Closed { reason }).await
    }

    /// Connection failed.
    pub async fn failed(&self, error: TransportError) -> bool {
        self.send(TransportEvent::Failed(error)).await
    }
}

/// Outbound side of one connection.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::Sender<String>,
}

impl TransportHandle {
    /// Handle writing into `outbound`. The transport closes the connection
    /// once every sender for `outbound` is gone.
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        Self { outbound }
    }

    /// Queue a text frame without waiting.
    ///
    /// # Errors
    ///
    /// - `TransportError::Io` if the queue is full or the connection task has
    ///   already finished; the frame is dropped
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Io("outbound queue full".to_string()),
            TrySendError::Closed(_) => TransportError::Io("connection task finished".to_string()),
        })
    }

    /// Close the connection.
    pub fn close(self) {
        drop(self.outbound);
    }
}
