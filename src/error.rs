use thiserror::Error;

/// Errors raised by the socket client.
///
/// Exhausting the configured reconnect attempts is deliberately not an error:
/// the client simply stays disconnected until the caller invokes `connect`
/// again.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The transport failed to open, or dropped while connecting.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A send was attempted while the client is not connected.
    /// The payload is not queued and never reaches the transport.
    #[error("socket is not connected")]
    NotConnected,
}

/// Errors raised by the silence-aware recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The capture device was denied or unavailable. Terminal for this
    /// attempt; the caller decides whether to call `start_recording` again.
    #[error("capture device denied or unavailable: {0}")]
    DeviceAccess(String),
}
