//! Cosmic Protocol - socket event names and payload definitions
//!
//! Every message exchanged with the collaboration backend is a bare event
//! name plus a JSON payload. Inbound payloads are validated into
//! [`InboundEvent`] at the boundary so downstream components never poke at
//! untyped JSON.

pub mod constants;
pub mod error;
pub mod events;
pub mod messages;
pub mod types;

pub use constants::*;
pub use error::*;
pub use events::InboundEvent;
pub use messages::{Frame, OutboundEvent};
pub use types::*;
