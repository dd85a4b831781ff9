//! Socket transport abstraction and the WebSocket implementation.
//!
//! A transport is opened once per connection attempt and reports its
//! lifecycle as a stream of [`TransportEvent`]s. It never reconnects on its
//! own; [`crate::WebSocketClient`] owns the retry schedule.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use cosmic_protocol::{
    Frame, CLIENT_DISCONNECT_REASON, TRANSPORT_CLOSE_REASON, TRANSPORT_ERROR_REASON,
};

/// Transports a client advertises in [`SocketOptions::transports`].
///
/// Only `WebSocket` is implemented. `Polling` is informational, kept so the
/// option list matches what the backend expects; [`WsTransport`] rejects an
/// open whose list lacks `WebSocket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    WebSocket,
    Polling,
}

/// Options handed to the transport on every open.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketOptions {
    pub transports: Vec<TransportKind>,
    /// Connect deadline, also passed through as the protocol timeout.
    pub timeout: Duration,
    /// Transport-level auto-reconnect. Always off; the client retries.
    pub reconnection: bool,
    /// Never reuse a pooled connection.
    pub force_new: bool,
}

impl SocketOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            timeout,
            reconnection: false,
            force_new: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The server acknowledged the connection.
    Connected,
    /// Any application event from the server.
    Message(Frame),
    /// The connection could not be established.
    ConnectError(String),
    /// An established (or pending) connection went away.
    Disconnected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(Frame),
    Close,
}

/// Both ends of one opened socket, as seen by the client.
pub struct SocketHandle {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

pub trait Transport: Send + Sync + 'static {
    /// Start opening a socket. Must return immediately; progress is reported
    /// on the returned event channel.
    fn open(&self, url: &str, options: &SocketOptions) -> SocketHandle;
}

/// JSON-over-WebSocket transport. Every open dials a fresh connection.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn open(&self, url: &str, options: &SocketOptions) -> SocketHandle {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();

        if options.transports.contains(&TransportKind::WebSocket) {
            tokio::spawn(run_socket(url.to_string(), options.timeout, out_rx, ev_tx));
        } else {
            let _ = ev_tx.send(TransportEvent::ConnectError(
                "no supported transport enabled".to_string(),
            ));
        }

        SocketHandle {
            outbound: out_tx,
            events: ev_rx,
        }
    }
}

async fn run_socket(
    url: String,
    timeout: Duration,
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
    ev_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let stream = match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            let _ = ev_tx.send(TransportEvent::ConnectError(e.to_string()));
            return;
        }
        Err(_) => {
            let _ = ev_tx.send(TransportEvent::ConnectError(format!(
                "timed out after {timeout:?}"
            )));
            return;
        }
    };

    tracing::debug!(url = %url, "WebSocket open");
    let _ = ev_tx.send(TransportEvent::Connected);
    let (mut sink, mut source) = stream.split();

    let reason = loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(Message::Text(frame.encode().into())).await {
                        tracing::debug!(error = %e, "WebSocket send failed");
                        break TRANSPORT_ERROR_REASON;
                    }
                }
                // A dropped sender means the client gave up on this socket.
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break CLIENT_DISCONNECT_REASON;
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => match Frame::decode(text.as_str()) {
                    Ok(frame) => {
                        let _ = ev_tx.send(TransportEvent::Message(frame));
                    }
                    Err(e) => tracing::debug!(error = %e, "dropping malformed frame"),
                },
                Some(Ok(Message::Close(_))) | None => break TRANSPORT_CLOSE_REASON,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket read failed");
                    break TRANSPORT_ERROR_REASON;
                }
            },
        }
    };

    let _ = ev_tx.send(TransportEvent::Disconnected(reason.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_enable_both_transports_without_auto_reconnect() {
        let opts = SocketOptions::with_timeout(Duration::from_secs(20));
        assert_eq!(
            opts.transports,
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
        assert!(!opts.reconnection);
        assert!(opts.force_new);
        assert_eq!(opts.timeout, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn unreachable_server_reports_connect_error() {
        let transport = WsTransport;
        // Port 9 (discard) on localhost is almost never listening.
        let mut handle = transport.open(
            "ws://127.0.0.1:9",
            &SocketOptions::with_timeout(Duration::from_secs(5)),
        );
        let event = handle.events.recv().await.expect("one event");
        assert!(matches!(event, TransportEvent::ConnectError(_)));
    }

    #[tokio::test]
    async fn polling_only_is_rejected() {
        let mut opts = SocketOptions::with_timeout(Duration::from_secs(1));
        opts.transports = vec![TransportKind::Polling];
        let mut handle = WsTransport.open("ws://127.0.0.1:9", &opts);
        assert!(matches!(
            handle.events.recv().await,
            Some(TransportEvent::ConnectError(_))
        ));
    }
}
