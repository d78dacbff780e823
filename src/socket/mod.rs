pub mod client;
pub mod transport;
pub mod ws;

pub use client::{
    ClientStats, ConnectionStatus, ErrorHandler, MessageHandler, SocketCallbacks, SocketClient,
    SocketClientOptions,
};
pub use transport::{Transport, TransportEvent, TransportHandle};
pub use ws::WebSocketTransport;
