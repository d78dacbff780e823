pub mod config;
pub mod error;
pub mod recorder;
pub mod socket;

pub use config::Config;
pub use error::{RecorderError, SocketError};
pub use recorder::{
    CaptureBackend, CaptureSession, RecorderCallbacks, RecorderOptions, RecorderStats,
    SilenceAwareRecorder, SpectrumSource,
};
pub use socket::{
    ClientStats, ConnectionStatus, SocketCallbacks, SocketClient, SocketClientOptions, Transport,
    TransportEvent, TransportHandle, WebSocketTransport,
};
