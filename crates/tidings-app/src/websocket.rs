//! WebSocket transport.
//!
//! One tokio task per connection. The task connects, reports `Opened`, then
//! pumps inbound text frames to the sink and outbound frames from the
//! handle to the socket until either side ends it.

use futures::{SinkExt, StreamExt};
use tidings_core::TransportError;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::transport::{Transport, TransportHandle, TransportSink};

/// Frames queued per connection before `TransportHandle::send` drops them.
const OUTBOUND_CAPACITY: usize = 64;

/// [`Transport`] over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, url: &str, sink: TransportSink) -> TransportHandle {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        tokio::spawn(run_connection(url.to_owned(), sink, rx));
        TransportHandle::new(tx)
    }
}

async fn run_connection(url: String, sink: TransportSink, mut outbound: mpsc::Receiver<String>) {
    let generation = sink.generation();

    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        // Handle closed before the handshake finished
        None = outbound.recv() => return,
    };

    let mut ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::debug!(%generation, error = %e, "websocket connect failed");
            sink.failed(TransportError::Connect(e.to_string())).await;
            return;
        },
    };

    if !sink.opened().await {
        return;
    }

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = ws.send(Message::Text(text.into())).await {
                        sink.failed(TransportError::Io(e.to_string())).await;
                        return;
                    }
                },
                None => {
                    // Best effort; the peer may already be gone
                    let _ = ws.close(None).await;
                    return;
                },
            },

            inbound = ws.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if !sink.frame(text.to_string()).await {
                        return;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    sink.closed(reason).await;
                    return;
                },
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(%generation, len = data.len(), "ignoring binary frame");
                },
                // Pings are answered by tungstenite itself
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    sink.failed(TransportError::Io(e.to_string())).await;
                    return;
                },
                None => {
                    sink.closed(None).await;
                    return;
                },
            },
        }
    }
}
