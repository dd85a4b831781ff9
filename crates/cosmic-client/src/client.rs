//! Reconnecting real-time client.
//!
//! States: `disconnected → connecting → connected`, plus an orthogonal demo
//! mode that short-circuits all three. At most one connection attempt is in
//! flight; each attempt gets a generation number and events from a
//! superseded socket are ignored.
//!
//! ```text
//!   connect()/send() ──▶ begin_connect ──▶ Transport::open
//!                                              │ TransportEvent
//!                                              ▼
//!   handlers ◀── emit ◀──────────────────── drive (per attempt)
//!                                              │ failure
//!                                              ▼
//!                              attempt_reconnect / schedule_reconnect
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use cosmic_protocol::{
    names, Frame, OutboundEvent, Timestamp, DEMO_MODE_REASON, TRANSPORT_CLOSE_REASON,
};

use crate::backend::BackendConfig;
use crate::backoff::ReconnectPolicy;
use crate::registry::{dispatch, EventRegistry, HandlerId};
use crate::transport::{Outbound, SocketOptions, Transport, TransportEvent};
use crate::ClientError;

pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 25_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Connect deadline and protocol timeout.
    pub socket_timeout: Duration,
    /// Ping period while connected. Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            socket_timeout: Duration::from_millis(DEFAULT_SOCKET_TIMEOUT_MS),
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Snapshot of the connection flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub manual_disconnect: bool,
    pub demo_mode: bool,
    pub reconnect_attempts: u32,
    /// Set once the retry budget is spent; cleared by a successful connect.
    pub reconnect_failed: bool,
}

struct ActiveSocket {
    generation: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
}

#[derive(Default)]
struct Timers {
    heartbeat: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    backend: BackendConfig,
    options: ClientOptions,
    url: Mutex<String>,
    status: Mutex<ConnectionStatus>,
    registry: Mutex<EventRegistry>,
    socket: Mutex<Option<ActiveSocket>>,
    timers: Mutex<Timers>,
    generation: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = timers.heartbeat.take() {
            task.abort();
        }
        if let Some(task) = timers.reconnect.take() {
            task.abort();
        }
    }
}

enum ConnectStart {
    Demo,
    AlreadyActive,
    Pending(oneshot::Receiver<Result<(), ClientError>>),
}

type Ready = Option<oneshot::Sender<Result<(), ClientError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn resolve(ready: &mut Ready, result: Result<(), ClientError>) {
    if let Some(tx) = ready.take() {
        let _ = tx.send(result);
    }
}

/// Cheaply cloneable handle; all clones share one connection.
///
/// Methods that may open a socket (`connect`, `send`) must be called from
/// within a Tokio runtime.
#[derive(Clone)]
pub struct WebSocketClient {
    inner: Arc<Inner>,
}

impl WebSocketClient {
    pub fn new(backend: BackendConfig, transport: impl Transport) -> Self {
        Self::with_options(backend, ClientOptions::default(), transport)
    }

    pub fn with_options(
        backend: BackendConfig,
        options: ClientOptions,
        transport: impl Transport,
    ) -> Self {
        let url = backend.websocket_url();
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                backend,
                options,
                url: Mutex::new(url),
                status: Mutex::new(ConnectionStatus::default()),
                registry: Mutex::new(EventRegistry::new()),
                socket: Mutex::new(None),
                timers: Mutex::new(Timers::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.inner.backend
    }

    pub fn url(&self) -> String {
        lock(&self.inner.url).clone()
    }

    // ── Connection state ────────────────────────────────────────────────

    pub fn connection_status(&self) -> ConnectionStatus {
        *lock(&self.inner.status)
    }

    /// Always false in demo mode.
    pub fn connected(&self) -> bool {
        let s = lock(&self.inner.status);
        s.is_connected && !s.demo_mode
    }

    pub fn is_demo_mode(&self) -> bool {
        lock(&self.inner.status).demo_mode
    }

    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.inner.status).reconnect_attempts
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    // ── Connect / disconnect ────────────────────────────────────────────

    /// Connect to the configured backend.
    ///
    /// Resolves immediately in demo mode or when a connection is already
    /// up or in flight. Otherwise resolves when the server acknowledges the
    /// connection, or fails on connect error, disconnect or timeout; every
    /// failure also schedules a reconnect.
    pub async fn connect(&self) -> Result<(), ClientError> {
        match self.begin_connect() {
            ConnectStart::Demo | ConnectStart::AlreadyActive => Ok(()),
            ConnectStart::Pending(rx) => rx.await.unwrap_or(Err(ClientError::Superseded)),
        }
    }

    /// Point the client at `url` and connect.
    pub async fn connect_to(&self, url: &str) -> Result<(), ClientError> {
        *lock(&self.inner.url) = url.to_string();
        self.connect().await
    }

    fn begin_connect(&self) -> ConnectStart {
        if self.inner.backend.should_use_demo_mode() {
            self.enter_demo_mode();
            return ConnectStart::Demo;
        }

        let generation = {
            let mut s = lock(&self.inner.status);
            if s.is_connected || s.is_connecting {
                return ConnectStart::AlreadyActive;
            }
            s.is_connecting = true;
            s.manual_disconnect = false;
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.teardown_socket();

        let url = self.url();
        let options = SocketOptions::with_timeout(self.inner.options.socket_timeout);
        tracing::debug!(url = %url, generation, "opening socket");
        let handle = self.inner.transport.open(&url, &options);

        *lock(&self.inner.socket) = Some(ActiveSocket {
            generation,
            outbound: handle.outbound,
        });

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(drive(
            Arc::downgrade(&self.inner),
            generation,
            handle.events,
            ready_tx,
            options.timeout,
        ));
        ConnectStart::Pending(ready_rx)
    }

    /// Close the connection on purpose. The resulting transport disconnect
    /// does not trigger a reconnect.
    pub fn disconnect(&self) {
        let demo = {
            let mut s = lock(&self.inner.status);
            s.manual_disconnect = true;
            s.is_connected = false;
            s.is_connecting = false;
            // Any attempt still opening is now superseded.
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            s.demo_mode
        };
        self.stop_heartbeat();
        self.cancel_reconnect();
        if demo {
            return;
        }
        if let Some(socket) = lock(&self.inner.socket).take() {
            let _ = socket.outbound.send(Outbound::Close);
        }
        tracing::info!("disconnected by request");
    }

    fn enter_demo_mode(&self) {
        {
            let mut s = lock(&self.inner.status);
            s.demo_mode = true;
            s.is_connected = false;
            s.is_connecting = false;
        }
        self.stop_heartbeat();
        self.cancel_reconnect();
        self.teardown_socket();
        tracing::info!(
            hostname = %self.inner.backend.hostname,
            "no socket backend for this deployment; running in demo mode"
        );
        self.emit(names::DISCONNECTED, &Value::String(DEMO_MODE_REASON.to_string()));
    }

    fn teardown_socket(&self) {
        // Dropping the sender closes the transport.
        if let Some(old) = lock(&self.inner.socket).take() {
            tracing::trace!(generation = old.generation, "tearing down socket");
        }
    }

    // ── Sending ─────────────────────────────────────────────────────────

    /// Send one event. Returns true only if it was handed to a live socket.
    ///
    /// Nothing is buffered: when disconnected this starts a connection
    /// attempt (unless one is in flight) and drops the message.
    pub fn send(&self, event: &str, payload: Value) -> bool {
        let (demo, connected, connecting) = {
            let s = lock(&self.inner.status);
            (s.demo_mode, s.is_connected, s.is_connecting)
        };
        if demo {
            tracing::debug!(event, "demo mode; message not sent");
            return false;
        }
        if connected {
            return self.send_frame(Frame::new(event, payload));
        }
        if !connecting {
            tracing::debug!(event, "not connected; starting connection");
            self.begin_connect();
        }
        false
    }

    pub fn send_event(&self, event: OutboundEvent) -> bool {
        let name = event.name();
        self.send(name, event.payload())
    }

    fn send_frame(&self, frame: Frame) -> bool {
        match lock(&self.inner.socket).as_ref() {
            Some(socket) => socket.outbound.send(Outbound::Frame(frame)).is_ok(),
            None => false,
        }
    }

    // ── Pub/sub ─────────────────────────────────────────────────────────

    pub fn on<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        lock(&self.inner.registry).on(event, Arc::new(handler))
    }

    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        lock(&self.inner.registry).off(event, id)
    }

    /// Deliver `payload` to every handler of `event`, isolating failures.
    pub fn emit(&self, event: &str, payload: &Value) {
        let handlers = lock(&self.inner.registry).handlers_for(event);
        if handlers.is_empty() {
            tracing::trace!(event, "no handlers");
            return;
        }
        dispatch(event, &handlers, payload);
    }

    // ── Transport callbacks ─────────────────────────────────────────────

    /// Returns false if the client was disconnected on purpose meanwhile.
    fn on_connected(&self, generation: u64) -> bool {
        {
            let mut s = lock(&self.inner.status);
            if s.manual_disconnect {
                return false;
            }
            s.is_connected = true;
            s.is_connecting = false;
            s.reconnect_attempts = 0;
            s.reconnect_failed = false;
        }
        self.start_heartbeat(generation);
        tracing::info!(url = %self.url(), "connected to backend");
        true
    }

    fn on_connect_timeout(&self, timeout: Duration) {
        {
            let mut s = lock(&self.inner.status);
            if s.manual_disconnect {
                return;
            }
            s.is_connecting = false;
        }
        self.teardown_socket();
        tracing::warn!(timeout_ms = timeout.as_millis() as u64, "connection attempt timed out");
        self.emit(
            names::ERROR,
            &json!({ "message": format!("connection timeout after {}ms", timeout.as_millis()) }),
        );
        self.attempt_reconnect();
    }

    fn on_connect_error(&self, message: &str) {
        lock(&self.inner.status).is_connecting = false;
        self.teardown_socket();
        tracing::warn!(error = %message, "connection error");
        self.emit(names::ERROR, &json!({ "message": message }));
        self.attempt_reconnect();
    }

    fn on_disconnected(&self, reason: &str) {
        let manual = {
            let mut s = lock(&self.inner.status);
            s.is_connected = false;
            s.is_connecting = false;
            s.manual_disconnect
        };
        self.stop_heartbeat();
        self.teardown_socket();

        if ReconnectPolicy::is_transport_failure(reason) {
            let delay = self.inner.options.reconnect.transport_retry;
            tracing::info!(reason, delay_ms = delay.as_millis() as u64, "transport failure; reconnecting");
            self.schedule_reconnect(delay);
        } else if !manual {
            tracing::info!(reason, "disconnected from backend");
            self.emit(names::DISCONNECTED, &Value::String(reason.to_string()));
            self.attempt_reconnect();
        }
    }

    // ── Reconnect / heartbeat timers ────────────────────────────────────

    fn attempt_reconnect(&self) {
        let policy = &self.inner.options.reconnect;
        let delay = {
            let mut s = lock(&self.inner.status);
            if s.demo_mode || s.manual_disconnect {
                return;
            }
            if policy.is_exhausted(s.reconnect_attempts) {
                if s.reconnect_failed {
                    return;
                }
                s.reconnect_failed = true;
                None
            } else {
                let delay = policy.delay_for(s.reconnect_attempts);
                s.reconnect_attempts += 1;
                Some((delay, s.reconnect_attempts))
            }
        };

        match delay {
            Some((delay, attempt)) => {
                tracing::info!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.schedule_reconnect(delay);
            }
            None => {
                tracing::warn!(max_attempts = policy.max_attempts, "giving up on reconnecting");
                self.emit(
                    names::RECONNECT_FAILED,
                    &json!({ "attempts": policy.max_attempts }),
                );
            }
        }
    }

    fn schedule_reconnect(&self, delay: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(client) = WebSocketClient::upgrade(&weak) else {
                return;
            };
            let skip = {
                let s = lock(&client.inner.status);
                s.is_connected || s.demo_mode || s.manual_disconnect
            };
            if !skip {
                client.begin_connect();
            }
        });
        if let Some(previous) = lock(&self.inner.timers).reconnect.replace(task) {
            previous.abort();
        }
    }

    fn cancel_reconnect(&self) {
        if let Some(task) = lock(&self.inner.timers).reconnect.take() {
            task.abort();
        }
    }

    fn start_heartbeat(&self, generation: u64) {
        let period = self.inner.options.heartbeat_interval;
        if period.is_zero() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(client) = WebSocketClient::upgrade(&weak) else {
                    break;
                };
                if !client.is_current(generation) || !client.connected() {
                    break;
                }
                let ping = OutboundEvent::Ping {
                    timestamp: Timestamp::now(),
                };
                if !client.send_frame(ping.into_frame()) {
                    break;
                }
                tracing::trace!("heartbeat sent");
            }
        });
        if let Some(previous) = lock(&self.inner.timers).heartbeat.replace(task) {
            previous.abort();
        }
    }

    fn stop_heartbeat(&self) {
        if let Some(task) = lock(&self.inner.timers).heartbeat.take() {
            task.abort();
        }
    }
}

/// Pump one socket's transport events until it fails or is superseded.
async fn drive(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ready: oneshot::Sender<Result<(), ClientError>>,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    let mut ready: Ready = Some(ready);

    loop {
        let next = if ready.is_some() {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    let current = WebSocketClient::upgrade(&inner)
                        .filter(|client| client.is_current(generation));
                    match current {
                        Some(client) => {
                            client.on_connect_timeout(timeout);
                            resolve(&mut ready, Err(ClientError::Timeout(timeout)));
                        }
                        None => resolve(&mut ready, Err(ClientError::Superseded)),
                    }
                    return;
                }
            }
        } else {
            events.recv().await
        };

        let Some(client) = WebSocketClient::upgrade(&inner) else {
            return;
        };
        if !client.is_current(generation) {
            tracing::trace!(generation, "ignoring event from superseded socket");
            return;
        }

        match next {
            Some(TransportEvent::Connected) => {
                if !client.on_connected(generation) {
                    resolve(&mut ready, Err(ClientError::Superseded));
                    return;
                }
                resolve(&mut ready, Ok(()));
                client.emit(names::CONNECTED, &json!({}));
            }
            Some(TransportEvent::Message(frame)) => {
                tracing::trace!(event = %frame.event, "relaying inbound event");
                client.emit(&frame.event, &frame.data);
            }
            Some(TransportEvent::ConnectError(message)) => {
                resolve(&mut ready, Err(ClientError::Connect(message.clone())));
                client.on_connect_error(&message);
                return;
            }
            Some(TransportEvent::Disconnected(reason)) => {
                resolve(&mut ready, Err(ClientError::Disconnected(reason.clone())));
                client.on_disconnected(&reason);
                return;
            }
            None => {
                resolve(
                    &mut ready,
                    Err(ClientError::Disconnected(TRANSPORT_CLOSE_REASON.to_string())),
                );
                client.on_disconnected(TRANSPORT_CLOSE_REASON);
                return;
            }
        }
    }
}
