//! In-memory transport for driving [`crate::WebSocketClient`] without a
//! network. Each `open` is recorded; tests push [`TransportEvent`]s into a
//! recorded socket and read what the client sent out of it.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::transport::{Outbound, SocketHandle, SocketOptions, Transport, TransportEvent};

struct OpenedSocket {
    url: String,
    options: SocketOptions,
    opened_at: Instant,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: Option<mpsc::UnboundedReceiver<Outbound>>,
}

#[derive(Default)]
struct MockState {
    opened: Vec<OpenedSocket>,
    auto_reply: Vec<TransportEvent>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that replays `events` on every open.
    pub fn replying(events: Vec<TransportEvent>) -> Self {
        let transport = Self::new();
        transport.set_auto_reply(events);
        transport
    }

    pub fn set_auto_reply(&self, events: Vec<TransportEvent>) {
        self.lock().auto_reply = events;
    }

    pub fn open_count(&self) -> usize {
        self.lock().opened.len()
    }

    pub fn opened_at(&self) -> Vec<Instant> {
        self.lock().opened.iter().map(|s| s.opened_at).collect()
    }

    pub fn url(&self, index: usize) -> Option<String> {
        self.lock().opened.get(index).map(|s| s.url.clone())
    }

    pub fn options(&self, index: usize) -> Option<SocketOptions> {
        self.lock().opened.get(index).map(|s| s.options.clone())
    }

    /// Deliver `event` on socket `index`. Returns false once the client has
    /// stopped listening to that socket.
    pub fn push(&self, index: usize, event: TransportEvent) -> bool {
        self.lock()
            .opened
            .get(index)
            .map(|s| s.events.send(event).is_ok())
            .unwrap_or(false)
    }

    /// Deliver `event` on the most recently opened socket.
    pub fn push_latest(&self, event: TransportEvent) -> bool {
        let last = self.open_count().saturating_sub(1);
        self.push(last, event)
    }

    /// Take the outbound side of socket `index` to observe what was sent.
    pub fn take_outbound(&self, index: usize) -> Option<mpsc::UnboundedReceiver<Outbound>> {
        self.lock().opened.get_mut(index).and_then(|s| s.outbound.take())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str, options: &SocketOptions) -> SocketHandle {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        for event in &state.auto_reply {
            let _ = ev_tx.send(event.clone());
        }
        state.opened.push(OpenedSocket {
            url: url.to_string(),
            options: options.clone(),
            opened_at: Instant::now(),
            events: ev_tx,
            outbound: Some(out_rx),
        });
        SocketHandle {
            outbound: out_tx,
            events: ev_rx,
        }
    }
}
