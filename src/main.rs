use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use voicelink::socket::WebSocketTransport;
use voicelink::{Config, SocketCallbacks, SocketClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config/voicelink")?;

    info!("{} v0.1.0", cfg.service.name);
    info!("Socket endpoint: {}", cfg.socket.url);
    info!(
        "Reconnect: auto={}, attempts={}, interval={}ms",
        cfg.socket.auto_reconnect, cfg.socket.reconnect_attempts, cfg.socket.reconnect_interval_ms
    );
    info!(
        "Silence detection: threshold={} dB, window={}ms",
        cfg.recorder.silence_threshold_db, cfg.recorder.silence_duration_ms
    );

    let callbacks = SocketCallbacks {
        on_message: Some(Arc::new(|payload| {
            info!("Received {} bytes", payload.len());
        })),
        on_error: Some(Arc::new(|reason| {
            warn!("Transport error: {}", reason);
        })),
    };

    let client = SocketClient::new(
        Arc::new(WebSocketTransport::new(cfg.socket.url.clone())),
        (&cfg.socket).into(),
        callbacks,
    );

    match client.connect().await {
        Ok(()) => {
            info!("Connected to {}", cfg.socket.url);
            client.close().await;
        }
        Err(e) => {
            warn!("Could not connect: {} (is a server listening?)", e);
            client.close().await;
        }
    }

    Ok(())
}
