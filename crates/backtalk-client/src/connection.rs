//! WebSocket connection lifecycle management.
//!
//! One [`ConnectionManager`] exists per application context. It owns the
//! transport exclusively and drives the state machine
//! `Disconnected → Connecting → Connected`, falling into `Reconnecting`
//! with exponential backoff on abnormal closure and into the terminal
//! `Failed` state once attempts are exhausted. A normal closure (or an
//! explicit [`ConnectionManager::disconnect`]) lands in `Disconnected`
//! without any reconnect scheduling.
//!
//! Per established transport the manager spawns a writer task (fed by an
//! mpsc channel so [`ConnectionManager::send`] never blocks), a reader task
//! (parses and routes inbound frames), and the heartbeat task. Each
//! transport carries a generation number so teardown events from a
//! superseded connection are no-ops.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use backtalk_core::{now_rfc3339, BackoffPolicy, ClientMessage};

use crate::config::ClientConfig;
use crate::coordinator::OutboundSink;
use crate::dispatch::{self, DispatchError, MessageHandler};
use crate::heartbeat;
use crate::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound frames queued between `send` and the writer task.
const OUTBOUND_BUFFER: usize = 64;

enum WriterCommand {
    Frame(String),
    Close,
}

struct ConnInner {
    config: ClientConfig,
    backoff: BackoffPolicy,
    state: Mutex<ConnectionState>,
    status_tx: watch::Sender<ConnectionState>,
    reconnect_attempts: AtomicU32,
    /// Set by an explicit disconnect; suppresses reconnect scheduling from
    /// the resulting close event.
    closing: AtomicBool,
    /// Incremented per established transport; stale teardowns compare
    /// against it and bail.
    generation: AtomicU64,
    writer: Mutex<Option<mpsc::Sender<WriterCommand>>>,
    heartbeat: Mutex<Option<CancellationToken>>,
    handler: Mutex<Option<Arc<dyn MessageHandler>>>,
}

/// Owns the transport and drives the connection lifecycle.
///
/// Clones share state; construct one per application context.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ConnInner>,
}

impl ConnectionManager {
    /// Create a manager for the given configuration. No transport is opened
    /// until [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let backoff = BackoffPolicy::new(config.reconnect_base_delay_ms);
        let (status_tx, _status_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ConnInner {
                config,
                backoff,
                state: Mutex::new(ConnectionState::Disconnected),
                status_tx,
                reconnect_attempts: AtomicU32::new(0),
                closing: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                writer: Mutex::new(None),
                heartbeat: Mutex::new(None),
                handler: Mutex::new(None),
            }),
        }
    }

    /// Register the inbound frame handler, replacing any previous one.
    ///
    /// Registered after construction to break the handler↔connection cycle;
    /// frames arriving before registration are logged and dropped.
    pub fn set_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.inner.handler.lock() = Some(handler);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Consecutive failed reconnect attempts so far.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Subscribe to state transitions. The receiver always holds the most
    /// recent state; a slow or failing observer cannot affect the state
    /// machine.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status_tx.subscribe()
    }

    /// Open the transport.
    ///
    /// A no-op while already Connecting or Connected. Resets the attempt
    /// counter (this is the only escape from `Failed`) and clears any
    /// pending explicit-disconnect suppression. Open failures never
    /// propagate to the caller: they are logged and fall into reconnect
    /// scheduling.
    pub async fn connect(&self) {
        self.inner.closing.store(false, Ordering::SeqCst);
        self.inner.reconnect_attempts.store(0, Ordering::SeqCst);
        start_connect(Arc::clone(&self.inner)).await;
    }

    /// Close the transport with a normal-closure code and stop the
    /// heartbeat. The resulting close event will not schedule a reconnect.
    pub fn disconnect(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        stop_heartbeat(&self.inner);
        let writer = self.inner.writer.lock().take();
        if let Some(tx) = writer {
            if tx.try_send(WriterCommand::Close).is_err() {
                debug!("close command not enqueued; transport already gone");
            }
        }
        set_state(&self.inner, ConnectionState::Disconnected);
    }

    /// Serialize and enqueue one outbound frame.
    ///
    /// Returns `false` without sending when not Connected, when the frame
    /// cannot be serialized, or when the outbound queue is full. Never
    /// panics.
    #[must_use]
    pub fn send(&self, message: &ClientMessage) -> bool {
        send_frame(&self.inner, message)
    }
}

impl OutboundSink for ConnectionManager {
    fn send(&self, message: &ClientMessage) -> bool {
        send_frame(&self.inner, message)
    }
}

// ── State publication ───────────────────────────────────────────────────────

fn set_state(inner: &ConnInner, next: ConnectionState) {
    let changed = {
        let mut state = inner.state.lock();
        if *state == next {
            false
        } else {
            *state = next;
            true
        }
    };
    if changed {
        publish_state(inner, next);
    }
}

/// Atomically claim the Connecting state; `false` when a transport is
/// already open or opening (duplicate-connect guard).
fn try_begin_connecting(inner: &ConnInner) -> bool {
    let claimed = {
        let mut state = inner.state.lock();
        if state.is_active() {
            false
        } else {
            *state = ConnectionState::Connecting;
            true
        }
    };
    if claimed {
        publish_state(inner, ConnectionState::Connecting);
    }
    claimed
}

fn publish_state(inner: &ConnInner, next: ConnectionState) {
    debug!(state = %next, "connection state changed");
    let _ = inner.status_tx.send_replace(next);
}

// ── Connect / reconnect ─────────────────────────────────────────────────────

async fn start_connect(inner: Arc<ConnInner>) {
    if inner.closing.load(Ordering::SeqCst) {
        // A stale reconnect timer firing after an explicit disconnect.
        debug!("connect suppressed after explicit disconnect");
        return;
    }
    if !try_begin_connecting(&inner) {
        debug!("connect ignored: already connecting or connected");
        return;
    }

    match connect_async(inner.config.server_url.as_str()).await {
        Ok((stream, _response)) => on_transport_open(inner, stream),
        Err(e) => {
            warn!(error = %e, url = %inner.config.server_url, "websocket connect failed");
            // Leave Connecting so the scheduler decides between
            // Reconnecting and Failed.
            schedule_reconnect(&inner);
        }
    }
}

fn on_transport_open(inner: Arc<ConnInner>, stream: WsStream) {
    if inner.closing.load(Ordering::SeqCst) {
        debug!("transport opened after an explicit disconnect; dropping it");
        set_state(&inner, ConnectionState::Disconnected);
        return;
    }

    let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let (sink, stream_rx) = stream.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    *inner.writer.lock() = Some(tx);
    inner.reconnect_attempts.store(0, Ordering::SeqCst);
    set_state(&inner, ConnectionState::Connected);
    info!(url = %inner.config.server_url, generation, "connected to feedback server");

    // Heartbeat runs only while Connected; any transition away cancels it.
    let cancel = CancellationToken::new();
    {
        let mut heartbeat_slot = inner.heartbeat.lock();
        if let Some(previous) = heartbeat_slot.take() {
            previous.cancel();
        }
        *heartbeat_slot = Some(cancel.clone());
    }
    let interval = Duration::from_millis(inner.config.heartbeat_interval_ms);
    let heartbeat_inner = Arc::clone(&inner);
    drop(tokio::spawn(async move {
        heartbeat::run_heartbeat(interval, cancel, move || {
            send_frame(
                &heartbeat_inner,
                &ClientMessage::Heartbeat {
                    timestamp: now_rfc3339(),
                },
            )
        })
        .await;
    }));

    drop(tokio::spawn(write_loop(rx, sink)));
    drop(tokio::spawn(read_loop(Arc::clone(&inner), generation, stream_rx)));
}

fn stop_heartbeat(inner: &ConnInner) {
    if let Some(cancel) = inner.heartbeat.lock().take() {
        cancel.cancel();
    }
}

fn schedule_reconnect(inner: &Arc<ConnInner>) {
    if inner.closing.load(Ordering::SeqCst) {
        return;
    }
    let attempts = inner.reconnect_attempts.load(Ordering::SeqCst);
    if attempts >= inner.config.max_reconnect_attempts {
        error!(attempts, "reconnect attempts exhausted; giving up");
        set_state(inner, ConnectionState::Failed);
        return;
    }

    let attempt = attempts + 1;
    inner.reconnect_attempts.store(attempt, Ordering::SeqCst);
    let delay = inner.backoff.delay(attempt);
    info!(attempt, ?delay, "scheduling reconnect");
    set_state(inner, ConnectionState::Reconnecting);

    let inner = Arc::clone(inner);
    drop(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // A manual connect() may have landed while the timer slept.
        if inner.state.lock().is_active() {
            debug!("reconnect timer fired while already connected");
            return;
        }
        start_connect(inner).await;
    }));
}

// ── Per-transport tasks ─────────────────────────────────────────────────────

async fn write_loop(
    mut rx: mpsc::Receiver<WriterCommand>,
    mut sink: SplitSink<WsStream, Message>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Frame(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "websocket write failed");
                    break;
                }
            }
            WriterCommand::Close => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client disconnect".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "close frame not delivered");
                }
                break;
            }
        }
    }
}

async fn read_loop(inner: Arc<ConnInner>, generation: u64, mut stream: SplitStream<WsStream>) {
    let mut normal_close = false;
    while let Some(next) = stream.next().await {
        match next {
            Ok(Message::Text(text)) => handle_frame(&inner, text.as_str()),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => handle_frame(&inner, text),
                Err(_) => debug!(len = data.len(), "dropping non-UTF8 binary frame"),
            },
            Ok(Message::Close(frame)) => {
                let code = frame.as_ref().map(|f| f.code);
                normal_close = code == Some(CloseCode::Normal);
                info!(?code, "server closed the connection");
                break;
            }
            Ok(_) => {} // Ping/Pong handled by the library
            Err(e) => {
                warn!(error = %e, "websocket read failed");
                break;
            }
        }
    }
    on_connection_lost(&inner, generation, normal_close);
}

fn handle_frame(inner: &ConnInner, text: &str) {
    let message = match dispatch::parse_frame(text) {
        Ok(message) => message,
        Err(e @ DispatchError::Malformed(_)) => {
            warn!(error = %e, "dropping malformed frame");
            return;
        }
        Err(e @ DispatchError::UnknownType { .. }) => {
            warn!(error = %e, "dropping unroutable frame");
            return;
        }
    };

    let handler = inner.handler.lock().clone();
    if let Some(handler) = handler {
        handler.handle(message);
    } else {
        warn!("inbound frame dropped: no handler registered");
    }
}

fn on_connection_lost(inner: &Arc<ConnInner>, generation: u64, normal_close: bool) {
    if generation != inner.generation.load(Ordering::SeqCst) {
        debug!(generation, "teardown from a superseded connection ignored");
        return;
    }

    stop_heartbeat(inner);
    *inner.writer.lock() = None;

    if normal_close || inner.closing.load(Ordering::SeqCst) {
        set_state(inner, ConnectionState::Disconnected);
        return;
    }
    schedule_reconnect(inner);
}

fn send_frame(inner: &ConnInner, message: &ClientMessage) -> bool {
    if *inner.state.lock() != ConnectionState::Connected {
        debug!(kind = message.kind(), "send skipped: not connected");
        return false;
    }
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, kind = message.kind(), "failed to serialize outbound frame");
            return false;
        }
    };
    let writer = inner.writer.lock();
    match writer.as_ref() {
        Some(tx) => tx.try_send(WriterCommand::Frame(json)).is_ok(),
        None => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
//
// Lifecycle paths that need a live endpoint are covered end-to-end in
// tests/integration.rs; the tests here validate the socket-free logic.

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(ClientConfig::default())
    }

    #[test]
    fn starts_disconnected() {
        let manager = manager();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[test]
    fn send_while_disconnected_returns_false() {
        let manager = manager();
        let sent = manager.send(&ClientMessage::Heartbeat {
            timestamp: "t".into(),
        });
        assert!(!sent);
    }

    #[test]
    fn send_connected_without_writer_returns_false() {
        // Connected state but the writer is gone (teardown race): still a
        // clean false, never a panic.
        let manager = manager();
        set_state(&manager.inner, ConnectionState::Connected);
        let sent = manager.send(&ClientMessage::Heartbeat {
            timestamp: "t".into(),
        });
        assert!(!sent);
    }

    #[test]
    fn disconnect_without_connection_is_clean() {
        let manager = manager();
        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let manager = manager();
        let mut rx = manager.subscribe();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);

        set_state(&manager.inner, ConnectionState::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        set_state(&manager.inner, ConnectionState::Failed);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Failed);
    }

    #[test]
    fn redundant_transition_not_published() {
        let manager = manager();
        let rx = manager.subscribe();
        set_state(&manager.inner, ConnectionState::Disconnected);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn try_begin_connecting_claims_once() {
        let manager = manager();
        assert!(try_begin_connecting(&manager.inner));
        assert!(!try_begin_connecting(&manager.inner));
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[test]
    fn exhausted_attempts_enter_failed() {
        let manager = manager();
        manager
            .inner
            .reconnect_attempts
            .store(manager.inner.config.max_reconnect_attempts, Ordering::SeqCst);
        schedule_reconnect(&manager.inner);
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn reconnect_increments_attempts_and_enters_reconnecting() {
        let manager = ConnectionManager::new(ClientConfig {
            reconnect_base_delay_ms: 60_000, // keep the timer pending
            ..ClientConfig::default()
        });
        schedule_reconnect(&manager.inner);
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(manager.reconnect_attempts(), 1);
    }

    #[tokio::test]
    async fn closing_flag_suppresses_reconnect() {
        let manager = manager();
        manager.inner.closing.store(true, Ordering::SeqCst);
        schedule_reconnect(&manager.inner);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn stale_generation_teardown_is_ignored() {
        let manager = manager();
        let _ = manager.inner.generation.fetch_add(2, Ordering::SeqCst);
        set_state(&manager.inner, ConnectionState::Connected);

        // Teardown from generation 1 while generation 2 is current.
        on_connection_lost(&manager.inner, 1, false);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn normal_close_lands_in_disconnected() {
        let manager = manager();
        let generation = manager.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        set_state(&manager.inner, ConnectionState::Connected);

        on_connection_lost(&manager.inner, generation, true);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn abnormal_close_schedules_reconnect() {
        let manager = ConnectionManager::new(ClientConfig {
            reconnect_base_delay_ms: 60_000,
            ..ClientConfig::default()
        });
        let generation = manager.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        set_state(&manager.inner, ConnectionState::Connected);

        on_connection_lost(&manager.inner, generation, false);
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(manager.reconnect_attempts(), 1);
    }

    #[test]
    fn handler_registration_replaces_previous() {
        struct CountingHandler;
        impl MessageHandler for CountingHandler {
            fn handle(&self, _message: backtalk_core::ServerMessage) {}
        }

        let manager = manager();
        manager.set_handler(Arc::new(CountingHandler));
        manager.set_handler(Arc::new(CountingHandler));
        assert!(manager.inner.handler.lock().is_some());
    }
}
