use thiserror::Error;

/// Errors raised while decoding or encoding socket payloads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown inbound event '{0}'")]
    UnknownEvent(String),

    #[error("invalid payload for '{event}': {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}
