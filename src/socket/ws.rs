use super::transport::{Transport, TransportEvent, TransportHandle};
use crate::error::SocketError;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

const CHANNEL_CAPACITY: usize = 32;

/// WebSocket transport backed by tokio-tungstenite.
///
/// Each `open` spawns one task that owns the socket for the lifetime of the
/// connection: it performs the handshake, then pumps inbound frames into
/// `TransportEvent`s and outbound payloads from the handle into the sink.
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> (Box<dyn TransportHandle>, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(run_connection(self.url.clone(), event_tx, out_rx));

        (Box::new(WebSocketHandle { out: out_tx }), event_rx)
    }
}

enum Outbound {
    Payload(Vec<u8>),
    Close,
}

struct WebSocketHandle {
    out: mpsc::Sender<Outbound>,
}

#[async_trait::async_trait]
impl TransportHandle for WebSocketHandle {
    async fn send(&self, payload: Vec<u8>) -> Result<(), SocketError> {
        self.out
            .send(Outbound::Payload(payload))
            .await
            .map_err(|_| SocketError::Connection("connection task has exited".to_string()))
    }

    async fn close(&self) {
        // Best effort: the connection task may already be gone.
        let _ = self.out.send(Outbound::Close).await;
    }
}

async fn run_connection(
    url: String,
    event_tx: mpsc::Sender<TransportEvent>,
    mut out_rx: mpsc::Receiver<Outbound>,
) {
    info!("Opening WebSocket connection to {}", url);

    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            let _ = event_tx.send(TransportEvent::Errored(e.to_string())).await;
            let _ = event_tx.send(TransportEvent::Closed).await;
            return;
        }
    };

    if event_tx.send(TransportEvent::Opened).await.is_err() {
        return;
    }

    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Binary(data))) => {
                    if event_tx.send(TransportEvent::Message(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Text(text))) => {
                    if event_tx.send(TransportEvent::Message(text.into_bytes())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("WebSocket closed by peer");
                    let _ = event_tx.send(TransportEvent::Closed).await;
                    break;
                }
                // Ping/pong is answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = event_tx.send(TransportEvent::Errored(e.to_string())).await;
                    let _ = event_tx.send(TransportEvent::Closed).await;
                    break;
                }
            },
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Payload(data)) => {
                    if let Err(e) = sink.send(Message::Binary(data)).await {
                        let _ = event_tx.send(TransportEvent::Errored(e.to_string())).await;
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    let _ = event_tx.send(TransportEvent::Closed).await;
                    break;
                }
            },
        }
    }

    debug!("WebSocket connection task finished");
}
