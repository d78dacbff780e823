use crate::error::SocketError;
use tokio::sync::mpsc;

/// Event emitted by a duplex transport.
///
/// This four-event contract is the full capability surface the client needs;
/// any transport implementing it is interchangeable.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established and ready for traffic.
    Opened,
    /// The connection is gone. Always the last event for a connection.
    Closed,
    /// A transport-level error. During establishment this means the open
    /// failed; after open it is informational and followed by `Closed` if
    /// the connection is lost.
    Errored(String),
    /// An inbound payload, delivered exactly as received.
    Message(Vec<u8>),
}

/// A duplex transport that can be opened repeatedly.
///
/// `open` returns immediately with a write handle and the event stream for
/// that connection; the first event is either `Opened` or `Errored`.
/// Establishment failures are reported through events rather than a
/// `Result` so that every outcome flows through the same channel.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> (Box<dyn TransportHandle>, mpsc::Receiver<TransportEvent>);
}

/// Write side of one open connection.
///
/// Takes `&self` so a handle can be shared: callers hand payloads over
/// without serializing behind exclusive access.
#[async_trait::async_trait]
pub trait TransportHandle: Send + Sync {
    /// Hand a payload to the transport. Does not wait for acknowledgment.
    async fn send(&self, payload: Vec<u8>) -> Result<(), SocketError>;

    /// Close the underlying connection, ignoring errors from the close
    /// itself.
    async fn close(&self);
}
