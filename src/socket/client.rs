use super::transport::{Transport, TransportEvent, TransportHandle};
use crate::error::SocketError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection status of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Configuration for the socket client.
#[derive(Debug, Clone)]
pub struct SocketClientOptions {
    /// Automatically reconnect after a transport-initiated close.
    pub auto_reconnect: bool,
    /// Maximum reconnect attempts before giving up. Once exhausted the
    /// client stays disconnected until the caller invokes `connect` again.
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts.
    pub reconnect_interval: Duration,
}

impl Default for SocketClientOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_attempts: 5,
            reconnect_interval: Duration::from_millis(3000),
        }
    }
}

pub type MessageHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Caller-supplied callbacks. Payloads and error reasons are delivered
/// exactly as received from the transport, with no parsing.
#[derive(Default, Clone)]
pub struct SocketCallbacks {
    pub on_message: Option<MessageHandler>,
    pub on_error: Option<ErrorHandler>,
}

/// Snapshot of the client's observable state.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub status: ConnectionStatus,
    pub attempt_count: u32,
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct ClientState {
    status: ConnectionStatus,
    attempt_count: u32,
    handle: Option<Arc<dyn TransportHandle>>,
    connected_at: Option<DateTime<Utc>>,
    reconnect_timer: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
    /// Monotonic generation counter, bumped by every `close()`. An in-flight
    /// attempt or timer records the epoch it was started under and abandons
    /// itself when a bump shows a `close()` happened in between.
    epoch: u64,
}

struct ClientShared {
    transport: Arc<dyn Transport>,
    options: SocketClientOptions,
    callbacks: SocketCallbacks,
    state: Mutex<ClientState>,
}

/// A duplex socket client that re-establishes its connection after an
/// unexpected drop, with a bounded attempt count and fixed-interval back-off.
///
/// One logical connection at a time: re-entrant `connect` calls are absorbed,
/// and a newly armed reconnect timer replaces any pending one.
pub struct SocketClient {
    shared: Arc<ClientShared>,
}

impl SocketClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        options: SocketClientOptions,
        callbacks: SocketCallbacks,
    ) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                transport,
                options,
                callbacks,
                state: Mutex::new(ClientState::default()),
            }),
        }
    }

    /// Open the connection, resolving once the transport reports open.
    ///
    /// A no-op success while already connected or while an attempt is in
    /// flight. On failure the reconnect path is triggered (unless disabled
    /// or exhausted) and the call fails with `SocketError::Connection`.
    pub async fn connect(&self) -> Result<(), SocketError> {
        ClientShared::connect(&self.shared).await
    }

    /// Hand a payload to the transport.
    ///
    /// Fails immediately with `SocketError::NotConnected` while not
    /// connected; the payload is not queued or retried. The state lock is
    /// only held for the status check, so a slow transport cannot stall
    /// `close()` or `stats()` behind a pending send.
    pub async fn send(&self, payload: impl Into<Vec<u8>>) -> Result<(), SocketError> {
        let handle = {
            let st = self.shared.state.lock().await;
            if st.status != ConnectionStatus::Connected {
                return Err(SocketError::NotConnected);
            }
            match st.handle.as_ref() {
                Some(handle) => Arc::clone(handle),
                None => return Err(SocketError::NotConnected),
            }
        };
        handle.send(payload.into()).await
    }

    /// Close the connection and suppress any pending or future reconnect.
    ///
    /// Cancels the reconnect timer and the event loop before releasing the
    /// transport handle, so no callback fires after teardown begins. The
    /// transport close itself is best effort. Idempotent; a later `connect`
    /// starts fresh.
    pub async fn close(&self) {
        let handle = {
            let mut st = self.shared.state.lock().await;
            st.epoch += 1;
            if let Some(timer) = st.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(task) = st.event_task.take() {
                task.abort();
            }
            st.status = ConnectionStatus::Disconnected;
            st.connected_at = None;
            st.handle.take()
        };

        if let Some(handle) = handle {
            handle.close().await;
        }

        debug!("Socket client closed");
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.state.lock().await.status == ConnectionStatus::Connected
    }

    /// Current observable state, for a UI layer to poll.
    pub async fn stats(&self) -> ClientStats {
        let st = self.shared.state.lock().await;
        ClientStats {
            status: st.status,
            attempt_count: st.attempt_count,
            connected_at: st.connected_at,
        }
    }
}

impl ClientShared {
    async fn connect(shared: &Arc<Self>) -> Result<(), SocketError> {
        let epoch = {
            let mut st = shared.state.lock().await;
            match st.status {
                ConnectionStatus::Connected => return Ok(()),
                ConnectionStatus::Connecting => {
                    debug!("connect() while an attempt is in flight; ignoring");
                    return Ok(());
                }
                ConnectionStatus::Disconnected => {
                    st.status = ConnectionStatus::Connecting;
                    st.epoch
                }
            }
        };

        let (handle, mut events) = shared.transport.open().await;

        // Wait for the transport to report open or fail.
        loop {
            match events.recv().await {
                Some(TransportEvent::Opened) => break,
                Some(TransportEvent::Errored(reason)) => {
                    if let Some(cb) = &shared.callbacks.on_error {
                        cb(&reason);
                    }
                    return Self::fail_connect(shared, reason, epoch).await;
                }
                Some(TransportEvent::Closed) | None => {
                    let reason = "transport closed before open".to_string();
                    return Self::fail_connect(shared, reason, epoch).await;
                }
                Some(TransportEvent::Message(_)) => {
                    // Not meaningful before open.
                }
            }
        }

        let mut st = shared.state.lock().await;
        if st.epoch != epoch {
            // close() arrived while the open was in flight; the close wins
            // and the late connection must not install itself.
            drop(st);
            handle.close().await;
            return Err(SocketError::Connection(
                "closed while connecting".to_string(),
            ));
        }

        st.status = ConnectionStatus::Connected;
        st.attempt_count = 0;
        st.connected_at = Some(Utc::now());
        st.handle = Some(Arc::from(handle));

        let task_shared = Arc::clone(shared);
        st.event_task = Some(tokio::spawn(async move {
            Self::event_loop(task_shared, events, epoch).await;
        }));

        info!("Socket connected");
        Ok(())
    }

    async fn fail_connect(
        shared: &Arc<Self>,
        reason: String,
        epoch: u64,
    ) -> Result<(), SocketError> {
        warn!("Connection attempt failed: {}", reason);

        let mut st = shared.state.lock().await;
        if st.epoch == epoch {
            st.status = ConnectionStatus::Disconnected;
            Self::schedule_reconnect(shared, &mut st);
        }
        Err(SocketError::Connection(reason))
    }

    /// Pump events for one established connection. Runs until the transport
    /// reports `Closed`, then flips the client back to disconnected and
    /// enters the reconnect path unless a `close()` superseded this
    /// connection.
    async fn event_loop(shared: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>, epoch: u64) {
        loop {
            match events.recv().await {
                Some(TransportEvent::Message(payload)) => {
                    if let Some(cb) = &shared.callbacks.on_message {
                        cb(payload);
                    }
                }
                Some(TransportEvent::Errored(reason)) => {
                    warn!("Transport error: {}", reason);
                    if let Some(cb) = &shared.callbacks.on_error {
                        cb(&reason);
                    }
                }
                Some(TransportEvent::Opened) => {}
                Some(TransportEvent::Closed) | None => break,
            }
        }

        let mut st = shared.state.lock().await;
        if st.epoch != epoch {
            // close() already tore this connection down.
            return;
        }
        st.status = ConnectionStatus::Disconnected;
        st.handle = None;
        st.connected_at = None;
        st.event_task = None;

        info!("Connection lost");
        Self::schedule_reconnect(&shared, &mut st);
    }

    /// Arm the reconnect timer, replacing any pending one. Attempts are
    /// strictly sequential: one timer, one attempt, and the next timer is
    /// only armed by that attempt's own failure.
    fn schedule_reconnect(shared: &Arc<Self>, st: &mut ClientState) {
        if !shared.options.auto_reconnect {
            return;
        }
        if st.attempt_count >= shared.options.reconnect_attempts {
            // Deliberately silent: no error event, the status simply stays
            // disconnected until the caller connects again.
            info!(
                "Reconnect attempts exhausted ({}); staying disconnected",
                shared.options.reconnect_attempts
            );
            return;
        }

        if let Some(timer) = st.reconnect_timer.take() {
            timer.abort();
        }

        let epoch = st.epoch;
        let timer_shared = Arc::clone(shared);
        st.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timer_shared.options.reconnect_interval).await;

            let attempt = {
                let mut st = timer_shared.state.lock().await;
                if st.epoch != epoch {
                    return;
                }
                st.reconnect_timer = None;
                st.attempt_count += 1;
                st.attempt_count
            };

            info!(
                "Reconnect attempt {}/{}",
                attempt, timer_shared.options.reconnect_attempts
            );
            if let Err(e) = Self::connect(&timer_shared).await {
                debug!("Reconnect attempt {} failed: {}", attempt, e);
            }
        }));
    }
}
