//! Cosmic Client - real-time connection to the collaboration backend.
//!
//! - [`BackendConfig`] resolves where the backend lives and whether the
//!   dashboard should run in demo mode
//! - [`WebSocketClient`] owns one socket at a time, relays every inbound
//!   event through its handler registry and reconnects with bounded
//!   exponential backoff
//! - [`StatusFallback`] polls the HTTP status endpoint when the socket path
//!   is unavailable

pub mod backend;
pub mod backoff;
pub mod client;
pub mod http;
pub mod registry;
pub mod testing;
pub mod transport;

pub use backend::BackendConfig;
pub use backoff::ReconnectPolicy;
pub use client::{ClientOptions, ConnectionStatus, WebSocketClient};
pub use http::StatusFallback;
pub use registry::{EventRegistry, Handler, HandlerId};
pub use transport::{
    Outbound, SocketHandle, SocketOptions, Transport, TransportEvent, TransportKind, WsTransport,
};

/// Errors from the client layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connect error: {0}")]
    Connect(String),

    #[error("disconnected before connecting: {0}")]
    Disconnected(String),

    #[error("connection attempt superseded")]
    Superseded,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
